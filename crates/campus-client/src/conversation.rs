//! Messages of the selected conversation.
//!
//! Only a selection changes which peer is displayed. Loads for a peer other
//! than the displayed one, or issued before a load that has already been
//! applied, are discarded on arrival.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use campus_shared::{Message, Peer};

use crate::api::{bounded, MessagingApi};
use crate::error::Result;

/// What the UI renders for the conversation pane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    pub peer: Option<Peer>,
    pub messages: Vec<Message>,
    /// Whether `messages` reflects a completed load for `peer`.
    pub loaded: bool,
}

/// Result of a conversation load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationRefresh {
    /// No peer given; nothing was requested.
    NoPeer,
    /// The response replaced the displayed messages.
    Applied { messages: usize },
    /// The response arrived too late and was dropped.
    Discarded,
}

#[derive(Debug)]
pub(crate) struct Ticket {
    peer: Peer,
    seq: u64,
}

#[derive(Debug, Default)]
struct State {
    current: Conversation,
    issued: u64,
    applied: u64,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    state: Mutex<State>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Conversation {
        self.lock().current.clone()
    }

    pub fn active_peer(&self) -> Option<Peer> {
        self.lock().current.peer.clone()
    }

    /// Display the conversation with `peer`. Switching to a different peer
    /// empties the pane and retires every load issued before the switch.
    /// Returns whether the displayed peer changed.
    pub(crate) fn select(&self, peer: &Peer) -> bool {
        let mut state = self.lock();
        if state.current.peer.as_ref() == Some(peer) {
            return false;
        }
        state.current = Conversation {
            peer: Some(peer.clone()),
            messages: Vec::new(),
            loaded: false,
        };
        state.applied = state.issued;
        true
    }

    /// Reserve a sequence number for a load of `peer`. The displayed peer is
    /// left alone; the load applies only if `peer` is still displayed when it
    /// lands.
    pub(crate) fn issue(&self, peer: &Peer) -> Ticket {
        let mut state = self.lock();
        state.issued += 1;
        Ticket {
            peer: peer.clone(),
            seq: state.issued,
        }
    }

    pub(crate) fn complete(&self, ticket: Ticket, mut messages: Vec<Message>) -> ConversationRefresh {
        let mut state = self.lock();
        if state.current.peer.as_ref() != Some(&ticket.peer) || ticket.seq <= state.applied {
            return ConversationRefresh::Discarded;
        }
        carry_read_marks(&state.current.messages, &mut messages);
        state.applied = ticket.seq;
        state.current.messages = messages;
        state.current.loaded = true;
        ConversationRefresh::Applied {
            messages: state.current.messages.len(),
        }
    }

    /// Deselect. In-flight loads for the old peer are discarded on arrival.
    pub fn clear(&self) -> bool {
        let mut state = self.lock();
        let had_peer = state.current.peer.is_some();
        state.current = Conversation::default();
        state.applied = state.issued;
        had_peer
    }

    pub async fn refresh<A: MessagingApi>(
        &self,
        api: &A,
        peer: Option<&Peer>,
        limit: Duration,
    ) -> Result<ConversationRefresh> {
        let Some(peer) = peer else {
            return Ok(ConversationRefresh::NoPeer);
        };
        let ticket = self.issue(peer);
        let messages = bounded(limit, api.conversation(peer)).await?;
        Ok(self.complete(ticket, messages))
    }
}

/// A message seen as read never reverts to unread, even if a lagging
/// replica still reports it unread.
fn carry_read_marks(previous: &[Message], next: &mut [Message]) {
    let marks: HashMap<i64, _> = previous
        .iter()
        .filter_map(|m| m.read_at.map(|at| (m.id, at)))
        .collect();
    if marks.is_empty() {
        return;
    }
    for message in next.iter_mut().filter(|m| m.read_at.is_none()) {
        if let Some(at) = marks.get(&message.id) {
            message.read_at = Some(*at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_shared::Role;
    use chrono::Utc;

    fn teacher() -> Peer {
        Peer::new("T5", Role::Teacher)
    }

    fn message(id: i64, from: &Peer, read: bool) -> Message {
        Message {
            id,
            sender_id: from.id.clone(),
            sender_role: from.role,
            recipient_id: "S100".into(),
            recipient_role: Role::Student,
            content: format!("message {id}"),
            created_at: Utc::now(),
            read_at: read.then(Utc::now),
        }
    }

    #[test]
    fn test_response_for_previous_peer_is_discarded() {
        let store = ConversationStore::new();
        let a = teacher();
        let b = Peer::new("H1", Role::Hod);
        store.select(&a);
        let for_a = store.issue(&a);
        store.select(&b);
        let for_b = store.issue(&b);
        assert_eq!(
            store.complete(for_b, vec![message(2, &b, false)]),
            ConversationRefresh::Applied { messages: 1 }
        );
        assert_eq!(
            store.complete(for_a, vec![message(1, &a, false)]),
            ConversationRefresh::Discarded
        );
        let shown = store.snapshot();
        assert_eq!(shown.peer, Some(b.clone()));
        assert!(shown.messages.iter().all(|m| m.is_from(&b)));
    }

    #[test]
    fn test_load_for_other_peer_never_takes_over() {
        let store = ConversationStore::new();
        let a = teacher();
        let b = Peer::new("H1", Role::Hod);
        store.select(&b);
        let for_a = store.issue(&a);
        assert_eq!(
            store.complete(for_a, vec![message(1, &a, false)]),
            ConversationRefresh::Discarded
        );
        assert_eq!(store.active_peer(), Some(b));
        assert!(store.snapshot().messages.is_empty());
    }

    #[test]
    fn test_switching_back_retires_older_loads() {
        let store = ConversationStore::new();
        let a = teacher();
        store.select(&a);
        let before = store.issue(&a);
        store.select(&Peer::new("H1", Role::Hod));
        assert!(store.select(&a));
        assert!(!store.select(&a));
        assert_eq!(
            store.complete(before, vec![message(1, &a, false)]),
            ConversationRefresh::Discarded
        );
        let fresh = store.issue(&a);
        assert_eq!(
            store.complete(fresh, vec![message(1, &a, false)]),
            ConversationRefresh::Applied { messages: 1 }
        );
    }

    #[test]
    fn test_late_response_for_same_peer_is_discarded() {
        let store = ConversationStore::new();
        let peer = teacher();
        store.select(&peer);
        let older = store.issue(&peer);
        let newer = store.issue(&peer);
        store.complete(newer, vec![message(1, &peer, false), message(2, &peer, false)]);
        assert_eq!(
            store.complete(older, vec![message(1, &peer, false)]),
            ConversationRefresh::Discarded
        );
        assert_eq!(store.snapshot().messages.len(), 2);
    }

    #[test]
    fn test_switching_peer_empties_pane() {
        let store = ConversationStore::new();
        let a = teacher();
        store.select(&a);
        let ticket = store.issue(&a);
        store.complete(ticket, vec![message(1, &a, false)]);
        assert!(store.select(&Peer::new("5", Role::Student)));
        let shown = store.snapshot();
        assert!(shown.messages.is_empty());
        assert!(!shown.loaded);
    }

    #[test]
    fn test_clear_discards_in_flight_load() {
        let store = ConversationStore::new();
        store.select(&teacher());
        let ticket = store.issue(&teacher());
        assert!(store.clear());
        assert_eq!(
            store.complete(ticket, vec![message(1, &teacher(), false)]),
            ConversationRefresh::Discarded
        );
        assert_eq!(store.snapshot(), Conversation::default());
        assert!(!store.clear());
    }

    #[test]
    fn test_read_marks_never_revert() {
        let store = ConversationStore::new();
        let peer = teacher();
        store.select(&peer);
        let first = store.issue(&peer);
        store.complete(first, vec![message(1, &peer, true), message(2, &peer, false)]);
        let second = store.issue(&peer);
        store.complete(second, vec![message(1, &peer, false), message(2, &peer, false)]);
        let shown = store.snapshot();
        assert!(shown.messages[0].is_read());
        assert!(!shown.messages[1].is_read());
    }
}
