//! Host side of the diagnostics flow.
//!
//! The diagnostics core never reads global state. This module gathers what it
//! needs from the HTTP request, the socket and the operating system and hands
//! it over as [`RawFacts`](crate::diagnostics::RawFacts).

pub mod facts;
pub mod system;

pub use facts::{collect, protocol_version, RuntimeFacts};
pub use system::SystemFacts;
