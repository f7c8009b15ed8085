//! Global unread-message counter shown on the messaging badge.

use std::time::Duration;

use campus_shared::lenient::clamp_count;

use crate::api::{bounded, MessagingApi};
use crate::error::Result;
use crate::slot::Slot;

#[derive(Debug)]
pub struct UnreadCounter {
    slot: Slot<u32>,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self { slot: Slot::new(0) }
    }

    pub fn get(&self) -> u32 {
        self.slot.get()
    }

    /// Fetch and clamp the count. `Ok(None)` means a newer load already
    /// landed; otherwise the flag tells whether the value changed.
    pub async fn refresh<A: MessagingApi>(
        &self,
        api: &A,
        limit: Duration,
    ) -> Result<Option<(u32, bool)>> {
        let seq = self.slot.issue();
        let raw = bounded(limit, api.unread_count()).await?;
        let count = clamp_count(raw);
        if raw != i64::from(count) {
            tracing::debug!(raw, count, "Clamped unread count");
        }
        let previous = self.get();
        if self.slot.apply(seq, count) {
            Ok(Some((count, previous != count)))
        } else {
            Ok(None)
        }
    }
}

impl Default for UnreadCounter {
    fn default() -> Self {
        Self::new()
    }
}
