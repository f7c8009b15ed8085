//! The messaging sync core: directory, thread list, selected conversation
//! and unread badge, kept fresh against the backend.
//!
//! Every load has two forms. `try_load_*` reports failures to the caller;
//! `load_*` logs them and returns whatever is currently held, which is what
//! the poll loops use.

use std::sync::Arc;
use std::time::Duration;

use campus_shared::{Directory, Peer};
use tracing::{debug, warn};

use crate::api::MessagingApi;
use crate::conversation::{Conversation, ConversationRefresh, ConversationStore};
use crate::directory::DirectoryCache;
use crate::error::{ClientError, Result};
use crate::events::{EventBus, MessagingEvent};
use crate::poller::{spawn_session_poller, PollerHandle};
use crate::session::SessionContext;
use crate::threads::{ThreadList, ThreadListView};
use crate::unread::UnreadCounter;

pub struct Messenger<B> {
    pub(crate) api: B,
    session: SessionContext,
    pub(crate) request_timeout: Duration,
    directory: DirectoryCache,
    conversation: ConversationStore,
    threads: ThreadList,
    unread: UnreadCounter,
}

impl<B: MessagingApi> Messenger<B> {
    pub fn new(api: B, session: SessionContext, request_timeout: Duration) -> Self {
        Self {
            api,
            session,
            request_timeout,
            directory: DirectoryCache::new(),
            conversation: ConversationStore::new(),
            threads: ThreadList::new(),
            unread: UnreadCounter::new(),
        }
    }

    pub fn api(&self) -> &B {
        &self.api
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        self.session.events()
    }

    // -- Snapshots --

    pub fn directory(&self) -> Option<Directory> {
        self.directory.snapshot()
    }

    pub fn directory_cache(&self) -> &DirectoryCache {
        &self.directory
    }

    pub fn conversation(&self) -> Conversation {
        self.conversation.snapshot()
    }

    pub fn active_peer(&self) -> Option<Peer> {
        self.conversation.active_peer()
    }

    pub fn threads(&self) -> ThreadListView {
        self.threads.view()
    }

    pub fn unread_count(&self) -> u32 {
        self.unread.get()
    }

    // -- Loads --

    pub async fn try_load_directory(&self) -> Result<Option<Directory>> {
        let loaded = self.directory.refresh(&self.api, self.request_timeout).await?;
        if let Some(directory) = &loaded {
            self.events().emit(MessagingEvent::DirectoryUpdated {
                entries: directory.len(),
            });
        }
        Ok(loaded)
    }

    /// Refresh the directory, keeping the previous one on failure.
    pub async fn load_directory(&self) -> Option<Directory> {
        if let Err(e) = self.try_load_directory().await {
            self.report("directory", &e);
        }
        self.directory.snapshot()
    }

    pub async fn try_load_conversation(&self, peer: Option<&Peer>) -> Result<ConversationRefresh> {
        let outcome = self
            .conversation
            .refresh(&self.api, peer, self.request_timeout)
            .await?;
        match (outcome, peer) {
            (ConversationRefresh::Applied { messages }, Some(peer)) => {
                self.events().emit(MessagingEvent::ConversationUpdated {
                    peer: peer.clone(),
                    messages,
                });
            }
            (ConversationRefresh::Discarded, Some(peer)) => {
                debug!(peer = %peer, "Discarded stale conversation response");
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Display the conversation with `peer`. This is the only way the
    /// displayed peer changes; loads never switch it.
    pub fn select_conversation(&self, peer: &Peer) -> bool {
        let changed = self.conversation.select(peer);
        if changed {
            debug!(peer = %peer, "Conversation selected");
        }
        changed
    }

    /// Refresh the conversation with `peer`. The result is shown only if
    /// `peer` is still the displayed conversation when it lands. Without a
    /// peer this does nothing.
    pub async fn load_conversation(&self, peer: Option<&Peer>) -> Conversation {
        if let Err(e) = self.try_load_conversation(peer).await {
            self.report("conversation", &e);
        }
        self.conversation.snapshot()
    }

    pub fn clear_conversation(&self) {
        if self.conversation.clear() {
            self.events().emit(MessagingEvent::ConversationCleared);
        }
    }

    pub async fn try_load_threads(&self) -> Result<Option<ThreadListView>> {
        let view = self.threads.refresh(&self.api, self.request_timeout).await?;
        if let Some(view) = &view {
            self.events().emit(MessagingEvent::ThreadsUpdated {
                count: view.threads().len(),
            });
        }
        Ok(view)
    }

    pub async fn load_threads(&self) -> ThreadListView {
        if let Err(e) = self.try_load_threads().await {
            self.report("threads", &e);
        }
        self.threads.view()
    }

    /// Fetch the badge count. Negative or oversized values are clamped.
    pub async fn try_load_unread_count(&self) -> Result<u32> {
        match self.unread.refresh(&self.api, self.request_timeout).await? {
            Some((unread, changed)) => {
                if changed {
                    self.events().emit(MessagingEvent::UnreadChanged { unread });
                }
                Ok(unread)
            }
            None => Ok(self.unread.get()),
        }
    }

    pub async fn load_unread_count(&self) -> u32 {
        if let Err(e) = self.try_load_unread_count().await {
            self.report("unread count", &e);
        }
        self.unread.get()
    }

    /// Keep the messaging badge fresh for the whole session, panel open or
    /// not.
    pub fn spawn_badge_poller(
        self: &Arc<Self>,
        interval: Duration,
        max_backoff: Duration,
    ) -> PollerHandle {
        let messenger = Arc::clone(self);
        spawn_session_poller(
            "messaging-badge",
            &self.session,
            interval,
            max_backoff,
            move || {
                let messenger = Arc::clone(&messenger);
                async move { messenger.try_load_unread_count().await.map(|_| ()) }
            },
        )
    }

    pub(crate) fn report(&self, what: &'static str, error: &ClientError) {
        if error.is_session_error() {
            debug!(what, error = %error, "Skipped refresh without a session");
        } else {
            warn!(what, error = %error, "Refresh failed");
        }
    }
}
