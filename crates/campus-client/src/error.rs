use std::time::Duration;

use campus_shared::DecodeError;
use thiserror::Error;

/// Errors produced while talking to the backend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure (connection refused, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No bearer token is available; the request was never sent.
    #[error("No active session")]
    NoSession,

    /// The backend answered `401`. The session has been invalidated.
    #[error("Unauthorized: session invalidated")]
    Unauthorized,

    /// Any other non-success status.
    #[error("Backend responded with status {0}")]
    Status(u16),

    /// The per-request deadline elapsed.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response failed validation.
    #[error("Invalid response: {0}")]
    Decode(#[from] DecodeError),

    /// The login endpoint refused the credentials.
    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Invalid backend URL: {0}")]
    Url(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Failures caused by the session rather than the network.
    pub fn is_session_error(&self) -> bool {
        matches!(self, ClientError::NoSession | ClientError::Unauthorized)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Outcome of a rejected user command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("No conversation selected")]
    NoPeerSelected,

    #[error("Message is empty")]
    EmptyContent,

    #[error("Invalid recipient: {0}")]
    InvalidPeer(String),

    #[error(transparent)]
    Backend(#[from] ClientError),
}

impl CommandError {
    /// Rejected locally, before any request was made.
    pub fn is_validation(&self) -> bool {
        !matches!(self, CommandError::Backend(_))
    }
}
