//! # campus-shared
//!
//! Types shared by the messaging sync client and the development backend:
//! peers and roles, messages and thread summaries, request bodies, response
//! envelopes, and the tolerant decoders applied to every backend response.

pub mod constants;
pub mod error;
pub mod lenient;
pub mod protocol;
pub mod types;
pub mod wire;

pub use error::DecodeError;
pub use protocol::*;
pub use types::*;
