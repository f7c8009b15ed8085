use campus_shared::{Peer, Principal};
use serde::Serialize;
use tokio::sync::broadcast;

pub const EVENT_SESSION_STARTED: &str = "session-started";
pub const EVENT_SESSION_ENDED: &str = "session-ended";
pub const EVENT_DIRECTORY_UPDATED: &str = "directory-updated";
pub const EVENT_THREADS_UPDATED: &str = "threads-updated";
pub const EVENT_CONVERSATION_UPDATED: &str = "conversation-updated";
pub const EVENT_CONVERSATION_CLEARED: &str = "conversation-cleared";
pub const EVENT_UNREAD_CHANGED: &str = "unread-changed";
pub const EVENT_NOTIFICATIONS_UPDATED: &str = "notifications-updated";
pub const EVENT_NOTIFICATION_UNREAD_CHANGED: &str = "notification-unread-changed";

/// Capacity of the event channel. Slow subscribers lag rather than block.
pub const EVENT_CAPACITY: usize = 64;

/// State changes published to UI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum MessagingEvent {
    SessionStarted { principal: Option<Principal> },
    SessionEnded,
    DirectoryUpdated { entries: usize },
    ThreadsUpdated { count: usize },
    ConversationUpdated { peer: Peer, messages: usize },
    ConversationCleared,
    UnreadChanged { unread: u32 },
    NotificationsUpdated { count: usize },
    NotificationUnreadChanged { unread: u32 },
}

impl MessagingEvent {
    /// Stable name for UI bridges that dispatch on strings.
    pub fn name(&self) -> &'static str {
        match self {
            MessagingEvent::SessionStarted { .. } => EVENT_SESSION_STARTED,
            MessagingEvent::SessionEnded => EVENT_SESSION_ENDED,
            MessagingEvent::DirectoryUpdated { .. } => EVENT_DIRECTORY_UPDATED,
            MessagingEvent::ThreadsUpdated { .. } => EVENT_THREADS_UPDATED,
            MessagingEvent::ConversationUpdated { .. } => EVENT_CONVERSATION_UPDATED,
            MessagingEvent::ConversationCleared => EVENT_CONVERSATION_CLEARED,
            MessagingEvent::UnreadChanged { .. } => EVENT_UNREAD_CHANGED,
            MessagingEvent::NotificationsUpdated { .. } => EVENT_NOTIFICATIONS_UPDATED,
            MessagingEvent::NotificationUnreadChanged { .. } => {
                EVENT_NOTIFICATION_UNREAD_CHANGED
            }
        }
    }
}

/// Fan-out of [`MessagingEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MessagingEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessagingEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: MessagingEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(event = e.0.name(), "No subscribers for event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
