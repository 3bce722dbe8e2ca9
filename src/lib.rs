//! request_diagnostics - per-request timing and environment diagnostics.
//!
//! The crate records named stages of a request on a monotonic clock, takes a
//! read-only snapshot of what is known about the request and its host, and
//! combines both into a report with advisory recommendations.
//!
//! # Layout
//!
//! - [`diagnostics`] - the synchronous core: stage clock, snapshot, rules, report
//! - [`host`] - gathers request and system facts for the core
//! - [`server`] - tokio/hyper front end serving reports as HTML, JSON or text
//! - [`config`] - environment configuration
//! - [`logging`] - JSON log formatter and subscriber setup
//!
//! # Example
//!
//! ```rust,ignore
//! use request_diagnostics::diagnostics::{fields, RawFacts, ReportBuilder, RequestSnapshot, StageClock};
//!
//! let mut clock = StageClock::new();
//! clock.mark("start")?;
//! let snapshot = RequestSnapshot::from_facts(
//!     RawFacts::new()
//!         .with(fields::METHOD, "GET")
//!         .with(fields::URI, "/")
//!         .with(fields::PROTOCOL_VERSION, "HTTP/1.1"),
//! )?;
//! clock.mark("end")?;
//!
//! let report = ReportBuilder::default().build(clock, &snapshot)?;
//! for rec in report.recommendations() {
//!     println!("{}: {}", rec.severity, rec.message);
//! }
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit hash supplied at build time (may be empty)
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 ()"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod host;
pub mod logging;
pub mod server;
pub mod timestamp;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{Error, Result};
pub use server::Server;
