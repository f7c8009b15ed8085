//! Notification list and its unread badge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use campus_shared::lenient::clamp_count;
use campus_shared::Notification;
use tracing::{debug, warn};

use crate::api::{bounded, NotificationApi};
use crate::error::Result;
use crate::events::{EventBus, MessagingEvent};
use crate::poller::{spawn_session_poller, PollerHandle};
use crate::session::SessionContext;
use crate::slot::Slot;

pub struct NotificationCenter<B> {
    pub(crate) api: B,
    session: SessionContext,
    pub(crate) request_timeout: Duration,
    pub(crate) list: Slot<Option<Vec<Notification>>>,
    pub(crate) unread: Slot<u32>,
}

impl<B: NotificationApi> NotificationCenter<B> {
    pub fn new(api: B, session: SessionContext, request_timeout: Duration) -> Self {
        Self {
            api,
            session,
            request_timeout,
            list: Slot::new(None),
            unread: Slot::new(0),
        }
    }

    pub fn api(&self) -> &B {
        &self.api
    }

    pub(crate) fn events(&self) -> &EventBus {
        self.session.events()
    }

    /// Loaded notifications, or `None` before the first successful load.
    pub fn notifications(&self) -> Option<Vec<Notification>> {
        self.list.get()
    }

    pub fn unread_count(&self) -> u32 {
        self.unread.get()
    }

    /// Reload the list and return what is held afterwards. A notification
    /// already marked read locally stays read even if the response predates
    /// the mark.
    pub async fn try_load_notifications(&self) -> Result<Vec<Notification>> {
        let seq = self.list.issue();
        let loaded = bounded(self.request_timeout, self.api.notifications()).await?;
        let count = loaded.len();
        if self.list.apply_merged(seq, Some(loaded), carry_read_flags) {
            self.events()
                .emit(MessagingEvent::NotificationsUpdated { count });
        }
        Ok(self.list.get().unwrap_or_default())
    }

    pub async fn load_notifications(&self) -> Vec<Notification> {
        if let Err(e) = self.try_load_notifications().await {
            warn!(error = %e, "Failed to load notifications");
        }
        self.list.get().unwrap_or_default()
    }

    pub async fn try_load_unread_count(&self) -> Result<u32> {
        let seq = self.unread.issue();
        let raw = bounded(self.request_timeout, self.api.notification_unread_count()).await?;
        let count = clamp_count(raw);
        let previous = self.unread.get();
        if self.unread.apply(seq, count) && previous != count {
            self.events()
                .emit(MessagingEvent::NotificationUnreadChanged { unread: count });
        }
        Ok(self.unread.get())
    }

    pub async fn load_unread_count(&self) -> u32 {
        if let Err(e) = self.try_load_unread_count().await {
            if e.is_session_error() {
                debug!(error = %e, "Skipped notification count without a session");
            } else {
                warn!(error = %e, "Failed to load notification count");
            }
        }
        self.unread.get()
    }

    /// Keep the notification badge fresh until the session ends or the
    /// handle is dropped.
    pub fn spawn_poller(
        self: &Arc<Self>,
        interval: Duration,
        max_backoff: Duration,
    ) -> PollerHandle {
        let center = Arc::clone(self);
        spawn_session_poller(
            "notification-badge",
            &self.session,
            interval,
            max_backoff,
            move || {
                let center = Arc::clone(&center);
                async move { center.try_load_unread_count().await.map(|_| ()) }
            },
        )
    }
}

fn carry_read_flags(held: &Option<Vec<Notification>>, next: &mut Option<Vec<Notification>>) {
    let (Some(held), Some(next)) = (held, next.as_mut()) else {
        return;
    };
    let read: HashSet<i64> = held.iter().filter(|n| n.is_read).map(|n| n.id).collect();
    for item in next.iter_mut().filter(|n| read.contains(&n.id)) {
        item.is_read = true;
    }
}
