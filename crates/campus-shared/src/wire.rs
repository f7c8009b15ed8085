//! Response envelopes and the tolerant decoders that turn backend JSON into
//! domain values.
//!
//! Every decoder validates element by element: rows that fail validation are
//! dropped and counted, a missing collection reads as empty, a missing
//! counter reads as zero.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::lenient;
use crate::protocol::{
    Directory, DirectoryEntry, Message, Notification, NotificationKind, ThreadSummary,
};
use crate::types::{Peer, Principal, Role, RoleGroup};

/// Decoded rows plus the number of rows rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub dropped: usize,
}

impl<T> Decoded<T> {
    fn from_values(values: Vec<Value>, decode: impl Fn(Value) -> Option<T>) -> Self {
        let total = values.len();
        let items: Vec<T> = values.into_iter().filter_map(decode).collect();
        Self {
            dropped: total - items.len(),
            items,
        }
    }

    fn empty() -> Self {
        Self {
            items: Vec::new(),
            dropped: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Thread row in the flat shape the backend emits: the counterpart under
/// `other_*`, the last message's fields inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRow {
    #[serde(deserialize_with = "lenient::string")]
    pub other_id: String,
    pub other_role: Role,
    #[serde(flatten)]
    pub message: Message,
    #[serde(default, alias = "unread_count", deserialize_with = "lenient::count")]
    pub unread: u32,
}

impl From<ThreadRow> for ThreadSummary {
    fn from(row: ThreadRow) -> Self {
        ThreadSummary {
            peer: Peer::new(row.other_id, row.other_role),
            last_message: row.message,
            unread_from_peer: row.unread,
        }
    }
}

/// Thread row in the nested shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedThreadRow {
    peer: Peer,
    #[serde(alias = "last_message")]
    last_message: Message,
    #[serde(default, alias = "unread_from_peer", deserialize_with = "lenient::count")]
    unread_from_peer: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnyThreadRow {
    Nested(NestedThreadRow),
    Flat(ThreadRow),
}

impl From<AnyThreadRow> for ThreadSummary {
    fn from(row: AnyThreadRow) -> Self {
        match row {
            AnyThreadRow::Nested(n) => ThreadSummary {
                peer: n.peer,
                last_message: n.last_message,
                unread_from_peer: n.unread_from_peer,
            },
            AnyThreadRow::Flat(f) => f.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadsResponse {
    pub threads: Vec<ThreadRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntryRow {
    pub id: String,
    pub role: Role,
    pub name: String,
}

impl From<&DirectoryEntry> for DirectoryEntryRow {
    fn from(entry: &DirectoryEntry) -> Self {
        Self {
            id: entry.peer.id.clone(),
            role: entry.peer.role,
            name: entry.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryBody {
    pub teachers: Vec<DirectoryEntryRow>,
    pub students: Vec<DirectoryEntryRow>,
    pub hod: Vec<DirectoryEntryRow>,
    pub principal: Vec<DirectoryEntryRow>,
}

impl From<&Directory> for DirectoryBody {
    fn from(directory: &Directory) -> Self {
        let rows = |group: RoleGroup| -> Vec<DirectoryEntryRow> {
            directory
                .group(group)
                .iter()
                .map(DirectoryEntryRow::from)
                .collect()
        };
        Self {
            teachers: rows(RoleGroup::Teachers),
            students: rows(RoleGroup::Students),
            hod: rows(RoleGroup::Hod),
            principal: rows(RoleGroup::Principal),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryResponse {
    pub directory: DirectoryBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationUnreadResponse {
    pub unread_count: i64,
}

/// User object returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

fn take_array(body: Value, key: &str) -> Option<Vec<Value>> {
    match body {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn first_of<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn raw_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// `{threads: [...]}`
pub fn decode_threads(body: Value) -> Decoded<ThreadSummary> {
    match take_array(body, "threads") {
        Some(rows) => Decoded::from_values(rows, |row| {
            serde_json::from_value::<AnyThreadRow>(row)
                .ok()
                .map(ThreadSummary::from)
        }),
        None => Decoded::empty(),
    }
}

/// `{messages: [...]}`
pub fn decode_messages(body: Value) -> Decoded<Message> {
    match take_array(body, "messages") {
        Some(rows) => Decoded::from_values(rows, |row| serde_json::from_value(row).ok()),
        None => Decoded::empty(),
    }
}

/// `{unread: n}`. Returns the raw value; clamping is the caller's concern.
pub fn decode_unread(body: &Value) -> i64 {
    raw_count(body.get("unread"))
}

/// `{directory: {teachers: [...], students: [...], hod: [...], principal: [...]}}`
///
/// `None` when the `directory` object itself is absent.
pub fn decode_directory(body: &Value) -> Option<Directory> {
    let groups = body.get("directory")?.as_object()?;
    let mut directory = Directory::new();
    for group in RoleGroup::ALL {
        let entries = groups
            .get(group.key())
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| decode_directory_entry(group, row))
                    .collect()
            })
            .unwrap_or_default();
        directory.insert(group, entries);
    }
    Some(directory)
}

fn decode_directory_entry(group: RoleGroup, row: &Value) -> Option<DirectoryEntry> {
    let map = row.as_object()?;
    let id = first_of(map, &["id", "roll_no", "username"]).and_then(scalar_string)?;
    let role = map
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .unwrap_or_else(|| group.default_role());
    let name = map
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    Some(DirectoryEntry {
        peer: Peer::new(id, role),
        name,
    })
}

/// Either a bare array or `{notifications: [...]}`.
pub fn decode_notifications(body: Value) -> Decoded<Notification> {
    let rows = match body {
        Value::Array(rows) => rows,
        other => match take_array(other, "notifications") {
            Some(rows) => rows,
            None => return Decoded::empty(),
        },
    };
    Decoded::from_values(rows, |row| decode_notification(&row))
}

fn decode_notification(row: &Value) -> Option<Notification> {
    let map = row.as_object()?;
    let id = match first_of(map, &["id", "notification_id"])? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let text = |keys: &[&str]| {
        first_of(map, keys)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let is_read = first_of(map, &["is_read", "isRead"])
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let created_at = first_of(map, &["created_at", "createdAt"])
        .and_then(Value::as_str)
        .and_then(|s| lenient::parse_timestamp(s).ok());
    Some(Notification {
        id,
        title: text(&["title"]),
        body: text(&["message", "body"]),
        kind: NotificationKind::parse(&text(&["type", "kind"])),
        is_read,
        created_at,
    })
}

/// `{unread_count: n}`, `{unreadCount: n}` or `{unread: n}`.
pub fn decode_notification_unread(body: &Value) -> i64 {
    let map = match body.as_object() {
        Some(map) => map,
        None => return 0,
    };
    raw_count(first_of(map, &["unread_count", "unreadCount", "unread"]))
}

/// `{user: {...}}` or a bare user object.
pub fn decode_principal(body: &Value) -> Result<Principal, DecodeError> {
    let user = body.get("user").unwrap_or(body);
    let map = user.as_object().ok_or(DecodeError::MissingField("user"))?;
    let id = first_of(map, &["id", "roll_no", "username", "user_id"])
        .and_then(scalar_string)
        .ok_or(DecodeError::MissingField("user.id"))?;
    let role = match map.get("role").and_then(Value::as_str) {
        Some(role) => role.parse::<Role>()?,
        None => return Err(DecodeError::MissingField("user.role")),
    };
    Ok(Principal::new(id, role))
}

/// `{success, token, user}` from the login endpoint.
pub fn decode_login(body: &Value) -> Result<(String, Principal), DecodeError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("login refused");
        return Err(DecodeError::Rejected(reason.to_string()));
    }
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or(DecodeError::MissingField("token"))?;
    let principal = decode_principal(body)?;
    Ok((token.to_string(), principal))
}
