use thiserror::Error;

/// Errors raised while validating a backend response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Backend rejected the request: {0}")]
    Rejected(String),
}
