//! Conversation list, most recent first as the backend orders it.

use std::time::Duration;

use campus_shared::ThreadSummary;

use crate::api::{bounded, MessagingApi};
use crate::error::Result;
use crate::slot::Slot;

/// Render state of the thread list. `Empty` is a real answer from the
/// backend, distinct from not having asked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadListView {
    NotLoaded,
    Empty,
    Threads(Vec<ThreadSummary>),
}

impl ThreadListView {
    pub fn threads(&self) -> &[ThreadSummary] {
        match self {
            ThreadListView::Threads(threads) => threads,
            _ => &[],
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self, ThreadListView::NotLoaded)
    }

    /// Threads matching a search box query.
    pub fn filtered(&self, query: &str) -> Vec<&ThreadSummary> {
        self.threads().iter().filter(|t| t.matches(query)).collect()
    }

    /// Sum of per-thread unread counts.
    pub fn unread_total(&self) -> u64 {
        self.threads()
            .iter()
            .map(|t| u64::from(t.unread_from_peer))
            .sum()
    }
}

#[derive(Debug)]
pub struct ThreadList {
    slot: Slot<Option<Vec<ThreadSummary>>>,
}

impl ThreadList {
    pub fn new() -> Self {
        Self {
            slot: Slot::new(None),
        }
    }

    pub fn view(&self) -> ThreadListView {
        self.slot.read(|threads| match threads {
            None => ThreadListView::NotLoaded,
            Some(threads) if threads.is_empty() => ThreadListView::Empty,
            Some(threads) => ThreadListView::Threads(threads.clone()),
        })
    }

    /// Fetch the list. `Ok(None)` means a newer load already landed.
    pub async fn refresh<A: MessagingApi>(
        &self,
        api: &A,
        limit: Duration,
    ) -> Result<Option<ThreadListView>> {
        let seq = self.slot.issue();
        let threads = bounded(limit, api.threads()).await?;
        if self.slot.apply(seq, Some(threads)) {
            Ok(Some(self.view()))
        } else {
            Ok(None)
        }
    }
}

impl Default for ThreadList {
    fn default() -> Self {
        Self::new()
    }
}
