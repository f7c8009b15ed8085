//! # campus-server
//!
//! In-memory development backend for the campus messaging client.
//!
//! It serves the messaging, notification and auth endpoints the client
//! polls, with a trivial token scheme, so the client can be exercised end to
//! end locally and in tests. Nothing is persisted.

pub mod api;
pub mod config;
pub mod error;
pub mod store;

pub use api::{build_router, serve, serve_listener, AppState};
pub use config::ServerConfig;
pub use error::ServerError;
pub use store::{Account, Store};
