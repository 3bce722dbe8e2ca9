//! Core types shared by the diagnostics pipeline.
//!
//! - [`Error`] - failures of clock, snapshot and report construction
//! - [`Result`] - alias over [`Error`]

mod error;

pub use error::{Error, Result};
