use tracing::warn;

use crate::api::{bounded, NotificationApi};
use crate::events::MessagingEvent;
use crate::notifications::NotificationCenter;

impl<B: NotificationApi> NotificationCenter<B> {
    /// Mark one notification read.
    ///
    /// The local list and badge update immediately; the badge only drops if
    /// the item was actually unread. Loads still in flight cannot undo the
    /// flip. Backend failures are logged, and the next poll reconciles.
    pub async fn mark_read(&self, id: i64) {
        let flipped = self.list.update(|list| {
            let unread = list
                .as_mut()
                .and_then(|items| items.iter_mut().find(|n| n.id == id && !n.is_read));
            match unread {
                Some(item) => {
                    item.is_read = true;
                    true
                }
                None => false,
            }
        });
        if flipped {
            let unread = self.unread.supersede(|count| {
                *count = count.saturating_sub(1);
                *count
            });
            self.events()
                .emit(MessagingEvent::NotificationUnreadChanged { unread });
        }

        if let Err(e) = bounded(self.request_timeout, self.api.mark_notification_read(id)).await {
            warn!(id, error = %e, "Failed to mark notification read");
        }
    }

    /// Mark every loaded unread notification read.
    pub async fn mark_all_read(&self) {
        let unread: Vec<i64> = self.list.read(|list| {
            list.iter()
                .flatten()
                .filter(|n| !n.is_read)
                .map(|n| n.id)
                .collect()
        });
        for id in unread {
            self.mark_read(id).await;
        }
    }
}
