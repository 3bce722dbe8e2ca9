//! Core error types.

use std::fmt;

/// Errors raised while recording stages, capturing a snapshot or building a report.
///
/// Every variant is a construction-time failure over data that is already
/// in memory, so none of them is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A stage with this name was already marked on the clock.
    DuplicateStage { name: String },

    /// A stage name was referenced that the clock never recorded.
    UnknownStage { name: String },

    /// `to` was marked before `from`.
    InvalidOrder { from: String, to: String },

    /// A mandatory snapshot field was absent, unknown or blank.
    MissingRequiredField { field: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateStage { name } => write!(f, "stage '{}' already marked", name),
            Error::UnknownStage { name } => write!(f, "unknown stage '{}'", name),
            Error::InvalidOrder { from, to } => {
                write!(f, "stage '{}' was marked before stage '{}'", to, from)
            }
            Error::MissingRequiredField { field } => {
                write!(f, "missing required field: {}", field)
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Short machine-readable kind, used in error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::DuplicateStage { .. } => "duplicate_stage",
            Error::UnknownStage { .. } => "unknown_stage",
            Error::InvalidOrder { .. } => "invalid_order",
            Error::MissingRequiredField { .. } => "missing_required_field",
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
