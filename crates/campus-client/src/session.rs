//! Session context: the bearer token, the authenticated principal, and the
//! liveness signal background pollers stop on.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use campus_shared::{LoginRequest, Principal};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::error::Result;
use crate::events::{EventBus, MessagingEvent};

const TOKEN_FILE_NAME: &str = "session.token";

/// Token persisted between runs, the way a browser keeps it in local storage.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/session.token` for this platform, if one exists.
    pub fn default_location() -> Option<Self> {
        directories::ProjectDirs::from("edu", "campus", "campus")
            .map(|dirs| Self::new(dirs.data_dir().join(TOKEN_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<String> {
        let token = std::fs::read_to_string(&self.path).ok()?;
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    pub fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)
    }

    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    principal: Option<Principal>,
}

struct Inner {
    state: Mutex<SessionState>,
    alive: watch::Sender<bool>,
    token_file: Option<TokenFile>,
    events: EventBus,
}

/// Shared handle to the current session. Cheap to clone.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    /// A session with no token and no persistence.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// A session seeded with a token obtained elsewhere.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::build(Some(token.into()), None)
    }

    /// A session backed by a token file, restoring whatever it holds.
    pub fn restore(token_file: TokenFile) -> Self {
        let token = token_file.load();
        if token.is_some() {
            debug!(path = %token_file.path().display(), "Restored session token");
        }
        Self::build(token, Some(token_file))
    }

    fn build(token: Option<String>, token_file: Option<TokenFile>) -> Self {
        let (alive, _) = watch::channel(token.is_some());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    token,
                    principal: None,
                }),
                alive,
                token_file,
                events: EventBus::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state().principal.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state().token.is_some()
    }

    /// Receiver that flips to `false` when the session ends.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.alive.subscribe()
    }

    /// Install a fresh token and principal, persisting the token.
    pub fn establish(&self, token: String, principal: Option<Principal>) {
        if let Some(file) = &self.inner.token_file {
            if let Err(e) = file.save(&token) {
                warn!(error = %e, "Failed to persist session token");
            }
        }
        {
            let mut state = self.state();
            state.token = Some(token);
            state.principal = principal.clone();
        }
        self.inner.alive.send_replace(true);
        self.inner
            .events
            .emit(MessagingEvent::SessionStarted { principal });
    }

    pub fn set_principal(&self, principal: Principal) {
        self.state().principal = Some(principal);
    }

    /// End the session. Idempotent: only the first call emits `SessionEnded`.
    pub fn invalidate(&self, reason: &str) {
        let had_token = {
            let mut state = self.state();
            state.principal = None;
            state.token.take().is_some()
        };
        if !had_token {
            return;
        }
        if let Some(file) = &self.inner.token_file {
            if let Err(e) = file.clear() {
                warn!(error = %e, "Failed to remove persisted token");
            }
        }
        self.inner.alive.send_replace(false);
        info!(reason, "Session ended");
        self.inner.events.emit(MessagingEvent::SessionEnded);
    }

    /// Exchange credentials for a token and establish the session.
    pub async fn login<A: AuthApi>(
        &self,
        api: &A,
        email: &str,
        password: &str,
    ) -> Result<Principal> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let (token, principal) = api.login(&request).await?;
        info!(id = %principal.id, role = %principal.role, "Logged in");
        self.establish(token, Some(principal.clone()));
        Ok(principal)
    }

    /// Resolve the principal behind the current token.
    pub async fn load_profile<A: AuthApi>(&self, api: &A) -> Result<Principal> {
        let principal = api.profile().await?;
        self.set_principal(principal.clone());
        Ok(principal)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SessionContext")
            .field("active", &state.token.is_some())
            .field("principal", &state.principal)
            .finish()
    }
}
