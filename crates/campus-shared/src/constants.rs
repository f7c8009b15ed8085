/// Application name
pub const APP_NAME: &str = "Campus";

/// Default backend base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default HTTP port of the development backend
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Panel poll period while the messaging panel is open
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Background unread badge poll period
pub const DEFAULT_BADGE_INTERVAL_MS: u64 = 30_000;

/// Upper bound for the badge poller's backoff
pub const DEFAULT_BADGE_MAX_BACKOFF_MS: u64 = 5 * 60 * 1_000;

/// Per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Messaging endpoints
pub const PATH_THREADS: &str = "/api/messages/threads";
pub const PATH_UNREAD_COUNT: &str = "/api/messages/unread-count";
pub const PATH_DIRECTORY: &str = "/api/messages/directory";
pub const PATH_CONVERSATION: &str = "/api/messages/with";
pub const PATH_SEND: &str = "/api/messages";
pub const PATH_MARK_READ: &str = "/api/messages/read";

/// Auth endpoints
pub const PATH_LOGIN: &str = "/api/auth/login";
pub const PATH_PROFILE: &str = "/api/auth/profile";

/// Notification endpoints
pub const PATH_NOTIFICATIONS: &str = "/api/notifications";
pub const PATH_NOTIFICATION_UNREAD: &str = "/api/notifications/unread-count";
