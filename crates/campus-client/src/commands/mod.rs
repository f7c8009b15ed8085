//! User-initiated operations.
//!
//! Each sub-module extends one sync component with the commands a UI wires
//! to its buttons.

pub mod messaging;
pub mod notifications;
