//! In-memory backend used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use campus_shared::{
    Directory, LoginRequest, MarkReadRequest, Message, Notification, NotificationKind, Peer,
    Principal, Role, SendMessageRequest, ThreadSummary,
};
use chrono::Utc;

use crate::api::{AuthApi, MessagingApi, NotificationApi};
use crate::error::{ClientError, Result};

pub(crate) const THREADS: &str = "threads";
pub(crate) const UNREAD: &str = "unread";
pub(crate) const DIRECTORY: &str = "directory";
pub(crate) const CONVERSATION: &str = "conversation";
pub(crate) const SEND: &str = "send";
pub(crate) const MARK_READ: &str = "mark_read";
pub(crate) const NOTIFICATIONS: &str = "notifications";
pub(crate) const NOTIFICATION_UNREAD: &str = "notification_unread";
pub(crate) const NOTIFICATION_READ: &str = "notification_read";

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub threads: Vec<ThreadSummary>,
    pub unread: i64,
    pub directory: Option<Directory>,
    pub conversations: HashMap<Peer, Vec<Message>>,
    /// Artificial latency of conversation loads, per peer.
    pub latency: HashMap<Peer, Duration>,
    /// Artificial latency of sends.
    pub send_latency: Option<Duration>,
    pub sent: Vec<SendMessageRequest>,
    pub marked: Vec<MarkReadRequest>,
    pub notifications: Vec<Notification>,
    pub notification_unread: i64,
    pub notifications_marked: Vec<i64>,
    /// Artificial latency of notification list and count loads.
    pub notification_latency: Option<Duration>,
    /// Endpoints that answer `503`.
    pub failing: HashSet<&'static str>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(setup: impl FnOnce(&mut FakeState)) -> Self {
        let backend = Self::new();
        backend.set(setup);
        backend
    }

    pub fn set(&self, edit: impl FnOnce(&mut FakeState)) {
        edit(&mut self.state());
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.get(endpoint).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.values().sum()
    }

    fn hit(&self, endpoint: &'static str) -> Result<()> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(endpoint)
            .or_default() += 1;
        if self.state().failing.contains(endpoint) {
            return Err(ClientError::Status(503));
        }
        Ok(())
    }
}

impl MessagingApi for FakeBackend {
    async fn threads(&self) -> Result<Vec<ThreadSummary>> {
        self.hit(THREADS)?;
        Ok(self.state().threads.clone())
    }

    async fn unread_count(&self) -> Result<i64> {
        self.hit(UNREAD)?;
        Ok(self.state().unread)
    }

    async fn directory(&self) -> Result<Directory> {
        self.hit(DIRECTORY)?;
        self.state()
            .directory
            .clone()
            .ok_or(ClientError::Decode(campus_shared::DecodeError::MissingField(
                "directory",
            )))
    }

    async fn conversation(&self, peer: &Peer) -> Result<Vec<Message>> {
        self.hit(CONVERSATION)?;
        let (messages, latency) = {
            let state = self.state();
            (
                state.conversations.get(peer).cloned().unwrap_or_default(),
                state.latency.get(peer).copied(),
            )
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(messages)
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<()> {
        self.hit(SEND)?;
        let latency = self.state().send_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state();
        let peer = request.peer();
        let id = state.conversations.values().map(Vec::len).sum::<usize>() as i64 + 1;
        let sent = message(id, &student(), &peer, &request.content);
        state.conversations.entry(peer).or_default().push(sent);
        state.sent.push(request.clone());
        Ok(())
    }

    async fn mark_read(&self, request: &MarkReadRequest) -> Result<()> {
        self.hit(MARK_READ)?;
        let mut state = self.state();
        state.marked.push(request.clone());
        state.unread = 0;
        Ok(())
    }
}

impl NotificationApi for FakeBackend {
    async fn notifications(&self) -> Result<Vec<Notification>> {
        self.hit(NOTIFICATIONS)?;
        let (notifications, latency) = {
            let state = self.state();
            (state.notifications.clone(), state.notification_latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(notifications)
    }

    async fn notification_unread_count(&self) -> Result<i64> {
        self.hit(NOTIFICATION_UNREAD)?;
        let (unread, latency) = {
            let state = self.state();
            (state.notification_unread, state.notification_latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(unread)
    }

    async fn mark_notification_read(&self, id: i64) -> Result<()> {
        self.hit(NOTIFICATION_READ)?;
        let mut guard = self.state();
        let state = &mut *guard;
        state.notifications_marked.push(id);
        if let Some(item) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && !n.is_read)
        {
            item.is_read = true;
            state.notification_unread = (state.notification_unread - 1).max(0);
        }
        Ok(())
    }
}

impl AuthApi for FakeBackend {
    async fn login(&self, request: &LoginRequest) -> Result<(String, Principal)> {
        if request.password == "secret" {
            Ok(("fake-token".into(), Principal::new("S100", Role::Student)))
        } else {
            Err(ClientError::LoginRejected("invalid credentials".into()))
        }
    }

    async fn profile(&self) -> Result<Principal> {
        Ok(Principal::new("S100", Role::Student))
    }
}

pub(crate) fn student() -> Peer {
    Peer::new("S100", Role::Student)
}

pub(crate) fn teacher() -> Peer {
    Peer::new("T5", Role::Teacher)
}

pub(crate) fn message(id: i64, from: &Peer, to: &Peer, content: &str) -> Message {
    Message {
        id,
        sender_id: from.id.clone(),
        sender_role: from.role,
        recipient_id: to.id.clone(),
        recipient_role: to.role,
        content: content.into(),
        created_at: Utc::now(),
        read_at: None,
    }
}

pub(crate) fn thread(peer: &Peer, content: &str, unread: u32) -> ThreadSummary {
    ThreadSummary {
        peer: peer.clone(),
        last_message: message(1, peer, &student(), content),
        unread_from_peer: unread,
    }
}

pub(crate) fn notification(id: i64, read: bool) -> Notification {
    Notification {
        id,
        title: format!("Notice {id}"),
        body: "Exam schedule published".into(),
        kind: NotificationKind::Info,
        is_read: read,
        created_at: Some(Utc::now()),
    }
}
