//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so a client pointed at a local backend
//! needs no configuration at all.

use std::path::PathBuf;
use std::time::Duration;

use campus_shared::constants::{
    DEFAULT_API_URL, DEFAULT_BADGE_INTERVAL_MS, DEFAULT_BADGE_MAX_BACKOFF_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_MS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend.
    /// Env: `CAMPUS_API_URL`
    /// Default: `http://localhost:5000`
    pub api_url: String,

    /// Refresh period of the open messaging panel.
    /// Env: `CAMPUS_POLL_INTERVAL_MS`
    /// Default: 5 s
    pub poll_interval: Duration,

    /// Base period of the session-wide badge pollers.
    /// Env: `CAMPUS_BADGE_INTERVAL_MS`
    /// Default: 30 s
    pub badge_interval: Duration,

    /// Ceiling of the badge pollers' backoff.
    /// Env: `CAMPUS_BADGE_MAX_BACKOFF_MS`
    /// Default: 5 min
    pub badge_max_backoff: Duration,

    /// Deadline applied to every backend call.
    /// Env: `CAMPUS_REQUEST_TIMEOUT_MS`
    /// Default: 10 s
    pub request_timeout: Duration,

    /// Where the session token is persisted.
    /// Env: `CAMPUS_TOKEN_PATH`
    /// Default: the platform data directory, or nowhere if it cannot be
    /// determined.
    pub token_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            badge_interval: Duration::from_millis(DEFAULT_BADGE_INTERVAL_MS),
            badge_max_backoff: Duration::from_millis(DEFAULT_BADGE_MAX_BACKOFF_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            token_path: crate::session::TokenFile::default_location().map(|f| f.path().to_path_buf()),
        }
    }
}

impl ClientConfig {
    /// Configuration for a given backend URL, everything else default.
    pub fn for_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CAMPUS_API_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                tracing::warn!("Empty CAMPUS_API_URL, using default");
            } else {
                config.api_url = url;
            }
        }

        override_duration("CAMPUS_POLL_INTERVAL_MS", &mut config.poll_interval);
        override_duration("CAMPUS_BADGE_INTERVAL_MS", &mut config.badge_interval);
        override_duration("CAMPUS_BADGE_MAX_BACKOFF_MS", &mut config.badge_max_backoff);
        override_duration("CAMPUS_REQUEST_TIMEOUT_MS", &mut config.request_timeout);

        if config.badge_max_backoff < config.badge_interval {
            tracing::warn!(
                interval = ?config.badge_interval,
                max_backoff = ?config.badge_max_backoff,
                "Badge backoff ceiling below base interval, raising it"
            );
            config.badge_max_backoff = config.badge_interval;
        }

        if let Ok(path) = std::env::var("CAMPUS_TOKEN_PATH") {
            config.token_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        config
    }
}

fn override_duration(var: &str, target: &mut Duration) {
    if let Ok(value) = std::env::var(var) {
        match parse_millis(&value) {
            Ok(duration) => *target = duration,
            Err(e) => {
                tracing::warn!(var, value = %value, error = %e, "Invalid duration, using default");
            }
        }
    }
}

/// Parse a positive millisecond count.
fn parse_millis(value: &str) -> Result<Duration, String> {
    let ms: u64 = value
        .trim()
        .parse()
        .map_err(|e| format!("not a number: {e}"))?;
    if ms == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.badge_interval, Duration::from_secs(30));
        assert_eq!(config.badge_max_backoff, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis(" 250 "), Ok(Duration::from_millis(250)));
        assert!(parse_millis("0").is_err());
        assert!(parse_millis("-5").is_err());
        assert!(parse_millis("fast").is_err());
    }

    #[test]
    fn test_for_url_keeps_defaults() {
        let config = ClientConfig::for_url("http://127.0.0.1:9000");
        assert_eq!(config.api_url, "http://127.0.0.1:9000");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
