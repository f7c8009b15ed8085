//! In-memory accounts, sessions, messages and notifications.

use std::collections::{BTreeMap, HashMap};

use campus_shared::wire::ThreadRow;
use campus_shared::{
    Directory, DirectoryEntry, Message, Notification, NotificationKind, Peer, Principal, Role,
    RoleGroup,
};
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl Account {
    pub fn new(user_id: &str, name: &str, email: &str, password: &str, role: Role) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role,
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.user_id.clone(), self.role)
    }
}

#[derive(Default)]
struct Inner {
    accounts: Vec<Account>,
    sessions: HashMap<String, Principal>,
    messages: Vec<Message>,
    notifications: HashMap<Peer, Vec<Notification>>,
    next_message_id: i64,
    next_notification_id: i64,
}

impl Inner {
    fn account(&self, principal: &Principal) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.user_id == principal.id && a.role == principal.role)
    }

    fn notify(&mut self, to: &Peer, title: &str, body: &str, kind: NotificationKind) {
        self.next_notification_id += 1;
        let notification = Notification {
            id: self.next_notification_id,
            title: title.to_string(),
            body: body.to_string(),
            kind,
            is_read: false,
            created_at: Some(Utc::now()),
        };
        self.notifications
            .entry(to.clone())
            .or_default()
            .push(notification);
    }
}

#[derive(Default)]
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// One account per role, all with password `campus123`.
    pub async fn with_demo_data() -> Self {
        let store = Self::new();
        for account in [
            Account::new("S100", "Aarav Patel", "s100@campus.edu", "campus123", Role::Student),
            Account::new("T5", "Meera Rao", "t5@campus.edu", "campus123", Role::Teacher),
            Account::new("H1", "Vikram Shah", "h1@campus.edu", "campus123", Role::Hod),
            Account::new("P1", "Anita Desai", "p1@campus.edu", "campus123", Role::Principal),
        ] {
            store.add_account(account).await;
        }
        store
    }

    /// Register an account and greet it with a notification.
    pub async fn add_account(&self, account: Account) {
        let mut inner = self.inner.lock().await;
        let peer = account.principal().as_peer();
        inner.notify(
            &peer,
            "Welcome",
            &format!("Welcome to the campus portal, {}", account.name),
            NotificationKind::Info,
        );
        inner.accounts.push(account);
    }

    /// Issue a fresh token for matching credentials.
    pub async fn login(&self, email: &str, password: &str) -> Option<(String, Account)> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email.trim()) && a.password == password)?
            .clone();
        let token = Uuid::new_v4().to_string();
        inner.sessions.insert(token.clone(), account.principal());
        Some((token, account))
    }

    pub async fn authenticate(&self, token: &str) -> Option<Principal> {
        self.inner.lock().await.sessions.get(token).cloned()
    }

    pub async fn account(&self, principal: &Principal) -> Option<Account> {
        self.inner.lock().await.account(principal).cloned()
    }

    /// One row per counterpart, most recent conversation first.
    pub async fn threads(&self, me: &Principal) -> Vec<ThreadRow> {
        let inner = self.inner.lock().await;
        let mut latest: HashMap<Peer, &Message> = HashMap::new();
        let mut unread: HashMap<Peer, u32> = HashMap::new();
        for message in inner.messages.iter() {
            let counterpart = if message.is_mine(me) {
                message.recipient()
            } else if message.recipient() == me.as_peer() {
                message.sender()
            } else {
                continue;
            };
            if !message.is_mine(me) && !message.is_read() {
                *unread.entry(counterpart.clone()).or_default() += 1;
            }
            let newer = latest
                .get(&counterpart)
                .map_or(true, |seen| (message.created_at, message.id) >= (seen.created_at, seen.id));
            if newer {
                latest.insert(counterpart, message);
            }
        }

        let mut rows: Vec<ThreadRow> = latest
            .into_iter()
            .map(|(peer, message)| ThreadRow {
                unread: unread.get(&peer).copied().unwrap_or(0),
                other_id: peer.id,
                other_role: peer.role,
                message: message.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            (b.message.created_at, b.message.id).cmp(&(a.message.created_at, a.message.id))
        });
        rows
    }

    pub async fn unread_count(&self, me: &Principal) -> i64 {
        let inner = self.inner.lock().await;
        let me = me.as_peer();
        inner
            .messages
            .iter()
            .filter(|m| m.recipient() == me && !m.is_read())
            .count() as i64
    }

    /// Everyone except `me`, grouped by role.
    pub async fn directory(&self, me: &Principal) -> Directory {
        let inner = self.inner.lock().await;
        let mut groups: BTreeMap<RoleGroup, Vec<DirectoryEntry>> = BTreeMap::new();
        for account in inner.accounts.iter() {
            if account.user_id == me.id && account.role == me.role {
                continue;
            }
            if let Some(group) = RoleGroup::for_role(account.role) {
                groups.entry(group).or_default().push(DirectoryEntry {
                    peer: Peer::new(account.user_id.clone(), account.role),
                    name: account.name.clone(),
                });
            }
        }
        let mut directory = Directory::new();
        for group in RoleGroup::ALL {
            directory.insert(group, groups.remove(&group).unwrap_or_default());
        }
        directory
    }

    /// Messages between `me` and `peer`, oldest first.
    pub async fn conversation(&self, me: &Principal, peer: &Peer) -> Vec<Message> {
        let inner = self.inner.lock().await;
        let me = me.as_peer();
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| {
                (m.sender() == me && &m.recipient() == peer)
                    || (&m.sender() == peer && m.recipient() == me)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        messages
    }

    pub async fn send(
        &self,
        me: &Principal,
        to: Peer,
        content: &str,
    ) -> Result<Message, ServerError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServerError::BadRequest("content is required".into()));
        }
        if to == me.as_peer() {
            return Err(ServerError::BadRequest("cannot message yourself".into()));
        }
        if to.id.trim().is_empty() {
            return Err(ServerError::BadRequest("toId is required".into()));
        }

        let mut inner = self.inner.lock().await;
        inner.next_message_id += 1;
        let message = Message {
            id: inner.next_message_id,
            sender_id: me.id.clone(),
            sender_role: me.role,
            recipient_id: to.id,
            recipient_role: to.role,
            content: content.to_string(),
            created_at: Utc::now(),
            read_at: None,
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    /// Mark every unread message from `from_id` to `me` read. Without a role
    /// every sender with that id matches. Returns how many changed.
    pub async fn mark_read(&self, me: &Principal, from_id: &str, from_role: Option<Role>) -> usize {
        let mut inner = self.inner.lock().await;
        let me = me.as_peer();
        let now = Utc::now();
        let mut updated = 0;
        for message in inner.messages.iter_mut() {
            let from_matches = message.sender_id == from_id
                && from_role.map_or(true, |role| message.sender_role == role);
            if from_matches && message.recipient() == me && message.read_at.is_none() {
                message.read_at = Some(now);
                updated += 1;
            }
        }
        updated
    }

    /// Newest first.
    pub async fn notifications(&self, me: &Principal) -> Vec<Notification> {
        let inner = self.inner.lock().await;
        let mut list = inner
            .notifications
            .get(&me.as_peer())
            .cloned()
            .unwrap_or_default();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }

    pub async fn notification_unread(&self, me: &Principal) -> i64 {
        let inner = self.inner.lock().await;
        inner
            .notifications
            .get(&me.as_peer())
            .map_or(0, |list| list.iter().filter(|n| !n.is_read).count() as i64)
    }

    pub async fn mark_notification_read(&self, me: &Principal, id: i64) -> Option<Notification> {
        let mut inner = self.inner.lock().await;
        let notification = inner
            .notifications
            .get_mut(&me.as_peer())?
            .iter_mut()
            .find(|n| n.id == id)?;
        notification.is_read = true;
        Some(notification.clone())
    }

    pub async fn notify(&self, to: &Principal, title: &str, body: &str, kind: NotificationKind) {
        self.inner
            .lock()
            .await
            .notify(&to.as_peer(), title, body, kind);
    }
}
