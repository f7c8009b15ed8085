use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Peer, Principal, Role, RoleGroup};

/// A direct message, created server-side.
///
/// Immutable except `read_at`, which moves once from `None` to a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    #[serde(deserialize_with = "crate::lenient::integer")]
    pub id: i64,
    #[serde(alias = "senderId", deserialize_with = "crate::lenient::string")]
    pub sender_id: String,
    #[serde(alias = "senderRole")]
    pub sender_role: Role,
    #[serde(alias = "recipientId", deserialize_with = "crate::lenient::string")]
    pub recipient_id: String,
    #[serde(alias = "recipientRole")]
    pub recipient_role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(alias = "createdAt", deserialize_with = "crate::lenient::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        alias = "readAt",
        deserialize_with = "crate::lenient::optional_timestamp"
    )]
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn sender(&self) -> Peer {
        Peer::new(self.sender_id.clone(), self.sender_role)
    }

    pub fn recipient(&self) -> Peer {
        Peer::new(self.recipient_id.clone(), self.recipient_role)
    }

    pub fn is_from(&self, peer: &Peer) -> bool {
        self.sender_id == peer.id && self.sender_role == peer.role
    }

    /// Whether the principal wrote this message.
    pub fn is_mine(&self, me: &Principal) -> bool {
        self.sender_id == me.id && self.sender_role == me.role
    }

    /// The other party of this message from the principal's point of view.
    pub fn counterpart(&self, me: &Principal) -> Peer {
        if self.is_mine(me) {
            self.recipient()
        } else {
            self.sender()
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Most recent message exchanged with one peer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThreadSummary {
    pub peer: Peer,
    pub last_message: Message,
    pub unread_from_peer: u32,
}

impl ThreadSummary {
    /// Case-insensitive match against `"<role> <id> <content>"`.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        format!(
            "{} {} {}",
            self.peer.role, self.peer.id, self.last_message.content
        )
        .to_lowercase()
        .contains(&query)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub peer: Peer,
    pub name: String,
}

/// Addressable peers grouped by role.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Directory {
    groups: BTreeMap<RoleGroup, Vec<DirectoryEntry>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: RoleGroup, entries: Vec<DirectoryEntry>) {
        self.groups.insert(group, entries);
    }

    pub fn group(&self, group: RoleGroup) -> &[DirectoryEntry] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = (RoleGroup, &[DirectoryEntry])> {
        self.groups.iter().map(|(g, e)| (*g, e.as_slice()))
    }

    pub fn find(&self, peer: &Peer) -> Option<&DirectoryEntry> {
        self.groups
            .values()
            .flat_map(|entries| entries.iter())
            .find(|entry| &entry.peer == peer)
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Success,
    Error,
    #[serde(other)]
    Other,
}

impl NotificationKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Self::Info,
            "warning" => Self::Warning,
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }
}

/// Serialized the way the backend's `Notification.to_dict` emits it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(deserialize_with = "crate::lenient::string")]
    pub to_id: String,
    pub to_role: Role,
    pub content: String,
}

impl SendMessageRequest {
    pub fn new(peer: &Peer, content: impl Into<String>) -> Self {
        Self {
            to_id: peer.id.clone(),
            to_role: peer.role,
            content: content.into(),
        }
    }

    pub fn peer(&self) -> Peer {
        Peer::new(self.to_id.clone(), self.to_role)
    }
}

/// Body of `POST /api/messages/read`.
///
/// `fromRole` is additive; servers that only know `fromId` ignore it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    #[serde(deserialize_with = "crate::lenient::string")]
    pub from_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_role: Option<Role>,
}

impl MarkReadRequest {
    pub fn new(peer: &Peer) -> Self {
        Self {
            from_id: peer.id.clone(),
            from_role: Some(peer.role),
        }
    }
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
