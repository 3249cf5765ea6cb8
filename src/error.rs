/// Error types for the reasoner pipeline
///
/// Covers the fatal kinds (malformed input, translation failures, mode
/// conflicts, solver breakdowns) as well as I/O and JSON decoding at the
/// document boundary. Negative verdicts such as `unsat` or `not_valid`
/// are ordinary replies, not errors.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The input or interface document violates a shape invariant
    #[error("input shape error: {0}")]
    InputShape(String),

    /// A constraint or preference source string was rejected
    #[error("failed to translate `{constraint}`: {message}")]
    Translate { constraint: String, message: String },

    /// More than one principal mode, or an incompatible flag combination
    #[error("conflicting modes: {0}")]
    ModeConflict(String),

    /// The solver returned no verdict (timeout or resource limit)
    #[error("solver gave no verdict while {0}")]
    Solver(String),

    /// Reading the input or writing the result line failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON or misses a required field
    #[error("malformed input document: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a translation failure on `source`
    pub fn translate(source: &str, message: impl Into<String>) -> Self {
        Error::Translate {
            constraint: source.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
