//! Wiring of one signed-in client: session, HTTP backend, sync components
//! and their pollers.

use std::sync::Arc;

use campus_shared::Principal;
use tokio::sync::broadcast;

use crate::api::HttpBackend;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::MessagingEvent;
use crate::messenger::Messenger;
use crate::notifications::NotificationCenter;
use crate::poller::PollerHandle;
use crate::scheduler::PollScheduler;
use crate::session::{SessionContext, TokenFile};

/// Both session-wide badge pollers. Dropping this stops them.
#[derive(Debug)]
pub struct BadgePollers {
    pub messaging: PollerHandle,
    pub notifications: PollerHandle,
}

pub struct CampusClient {
    config: ClientConfig,
    session: SessionContext,
    backend: HttpBackend,
    messenger: Arc<Messenger<HttpBackend>>,
    notifications: Arc<NotificationCenter<HttpBackend>>,
}

impl CampusClient {
    /// Build a client, restoring any token persisted at `config.token_path`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let session = match &config.token_path {
            Some(path) => SessionContext::restore(TokenFile::new(path)),
            None => SessionContext::new(),
        };
        Self::with_session(config, session)
    }

    pub fn with_session(config: ClientConfig, session: SessionContext) -> Result<Self> {
        let backend = HttpBackend::new(&config, session.clone())?;
        let messenger = Arc::new(Messenger::new(
            backend.clone(),
            session.clone(),
            config.request_timeout,
        ));
        let notifications = Arc::new(NotificationCenter::new(
            backend.clone(),
            session.clone(),
            config.request_timeout,
        ));
        Ok(Self {
            config,
            session,
            backend,
            messenger,
            notifications,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn messenger(&self) -> &Arc<Messenger<HttpBackend>> {
        &self.messenger
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter<HttpBackend>> {
        &self.notifications
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessagingEvent> {
        self.session.events().subscribe()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Principal> {
        self.session.login(&self.backend, email, password).await
    }

    pub async fn load_profile(&self) -> Result<Principal> {
        self.session.load_profile(&self.backend).await
    }

    /// End the session. Running pollers stop on their own.
    pub fn logout(&self) {
        self.session.invalidate("logout");
    }

    /// A closed messaging panel bound to this client.
    pub fn panel(&self) -> PollScheduler<HttpBackend> {
        PollScheduler::new(Arc::clone(&self.messenger), self.config.poll_interval)
    }

    /// Start the messaging and notification badge pollers. Spawned before
    /// login, they stay idle until the session starts.
    pub fn spawn_badge_pollers(&self) -> BadgePollers {
        BadgePollers {
            messaging: self
                .messenger
                .spawn_badge_poller(self.config.badge_interval, self.config.badge_max_backoff),
            notifications: self
                .notifications
                .spawn_poller(self.config.badge_interval, self.config.badge_max_backoff),
        }
    }
}
