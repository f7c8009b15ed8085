//! # campus-client
//!
//! Client-side sync core of the campus messaging feature: a directory of
//! addressable peers, the thread list, the selected conversation, and the
//! unread badges, kept current against the backend by short polling.

pub mod api;
pub mod client;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod events;
pub mod messenger;
pub mod notifications;
pub mod poller;
pub mod scheduler;
pub mod session;
pub mod threads;
pub mod unread;

mod slot;
#[cfg(test)]
mod testing;

pub use client::{BadgePollers, CampusClient};
pub use config::ClientConfig;
pub use error::{ClientError, CommandError};
pub use events::{EventBus, MessagingEvent};
pub use messenger::Messenger;
pub use scheduler::{PanelState, PollScheduler};
pub use session::SessionContext;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the `fmt` subscriber for an embedding app. Honours `RUST_LOG`.
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("campus_client=debug,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
