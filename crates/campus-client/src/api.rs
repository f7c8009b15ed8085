//! Backend seams and their HTTP implementation.
//!
//! The sync components only ever see the traits below; [`HttpBackend`]
//! implements them over `reqwest`, and tests substitute in-memory fakes.

use std::future::Future;
use std::time::Duration;

use campus_shared::constants::{
    PATH_CONVERSATION, PATH_DIRECTORY, PATH_LOGIN, PATH_MARK_READ, PATH_NOTIFICATIONS,
    PATH_NOTIFICATION_UNREAD, PATH_PROFILE, PATH_SEND, PATH_THREADS, PATH_UNREAD_COUNT,
};
use campus_shared::wire::{self, Decoded};
use campus_shared::{
    DecodeError, Directory, LoginRequest, MarkReadRequest, Message, Notification, Peer,
    Principal, SendMessageRequest, ThreadSummary,
};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::SessionContext;

/// Messaging endpoints. Every call carries the session's bearer token.
pub trait MessagingApi: Send + Sync + 'static {
    fn threads(&self) -> impl Future<Output = Result<Vec<ThreadSummary>>> + Send;

    /// Raw server value; may be negative or absurd.
    fn unread_count(&self) -> impl Future<Output = Result<i64>> + Send;

    /// Fails when the response carries no `directory` object.
    fn directory(&self) -> impl Future<Output = Result<Directory>> + Send;

    fn conversation(&self, peer: &Peer) -> impl Future<Output = Result<Vec<Message>>> + Send;

    fn send_message(&self, request: &SendMessageRequest) -> impl Future<Output = Result<()>> + Send;

    fn mark_read(&self, request: &MarkReadRequest) -> impl Future<Output = Result<()>> + Send;
}

/// Notification endpoints.
pub trait NotificationApi: Send + Sync + 'static {
    fn notifications(&self) -> impl Future<Output = Result<Vec<Notification>>> + Send;

    fn notification_unread_count(&self) -> impl Future<Output = Result<i64>> + Send;

    fn mark_notification_read(&self, id: i64) -> impl Future<Output = Result<()>> + Send;
}

/// Authentication endpoints.
pub trait AuthApi: Send + Sync {
    /// Returns the issued token and the principal it belongs to.
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<(String, Principal)>> + Send;

    fn profile(&self) -> impl Future<Output = Result<Principal>> + Send;
}

/// Run `fut` under the per-request deadline.
pub(crate) async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(ClientError::Timeout(limit)))
}

fn log_dropped<T>(what: &'static str, decoded: Decoded<T>) -> Vec<T> {
    if decoded.dropped > 0 {
        warn!(what, dropped = decoded.dropped, "Dropped malformed rows");
    }
    decoded.items
}

/// `reqwest`-based backend bound to one session.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base: Url,
    session: SessionContext,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig, session: SessionContext) -> Result<Self> {
        let base = Url::parse(&config.api_url).map_err(|e| ClientError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Url(config.api_url.clone()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Join `path` and `extra` onto the base URL, percent-encoding each
    /// segment.
    fn endpoint(&self, path: &str, extra: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::Url(self.base.to_string()))?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            segments.extend(extra);
        }
        Ok(url)
    }

    /// Attach the bearer token, failing fast when there is none.
    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.session.token().ok_or(ClientError::NoSession)?;
        Ok(builder.bearer_auth(token))
    }

    async fn get(&self, url: Url) -> Result<Value> {
        let request = self.authorized(self.http.get(url))?;
        self.read(request.send().await?).await
    }

    async fn post<B: serde::Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Value> {
        let request = self.authorized(self.http.post(url).json(body))?;
        self.read(request.send().await?).await
    }

    async fn put(&self, url: Url) -> Result<Value> {
        let request = self.authorized(self.http.put(url))?;
        self.read(request.send().await?).await
    }

    /// Map status codes and parse the body. A body that is not JSON reads
    /// as `null` so the decoders fall back to their empty values.
    async fn read(&self, response: Response) -> Result<Value> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.session.invalidate("backend answered 401");
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        parse_body(&response.bytes().await?)
    }
}

fn parse_body(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes).unwrap_or_else(|e| {
        debug!(error = %e, "Response body is not JSON");
        Value::Null
    }))
}

impl MessagingApi for HttpBackend {
    async fn threads(&self) -> Result<Vec<ThreadSummary>> {
        let body = self.get(self.endpoint(PATH_THREADS, &[])?).await?;
        Ok(log_dropped("threads", wire::decode_threads(body)))
    }

    async fn unread_count(&self) -> Result<i64> {
        let body = self.get(self.endpoint(PATH_UNREAD_COUNT, &[])?).await?;
        Ok(wire::decode_unread(&body))
    }

    async fn directory(&self) -> Result<Directory> {
        let body = self.get(self.endpoint(PATH_DIRECTORY, &[])?).await?;
        wire::decode_directory(&body).ok_or(ClientError::Decode(DecodeError::MissingField(
            "directory",
        )))
    }

    async fn conversation(&self, peer: &Peer) -> Result<Vec<Message>> {
        let url = self.endpoint(PATH_CONVERSATION, &[peer.role.as_str(), peer.id.as_str()])?;
        let body = self.get(url).await?;
        Ok(log_dropped("messages", wire::decode_messages(body)))
    }

    async fn send_message(&self, request: &SendMessageRequest) -> Result<()> {
        self.post(self.endpoint(PATH_SEND, &[])?, request).await?;
        Ok(())
    }

    async fn mark_read(&self, request: &MarkReadRequest) -> Result<()> {
        self.post(self.endpoint(PATH_MARK_READ, &[])?, request).await?;
        Ok(())
    }
}

impl NotificationApi for HttpBackend {
    async fn notifications(&self) -> Result<Vec<Notification>> {
        let body = self.get(self.endpoint(PATH_NOTIFICATIONS, &[])?).await?;
        Ok(log_dropped("notifications", wire::decode_notifications(body)))
    }

    async fn notification_unread_count(&self) -> Result<i64> {
        let body = self.get(self.endpoint(PATH_NOTIFICATION_UNREAD, &[])?).await?;
        Ok(wire::decode_notification_unread(&body))
    }

    async fn mark_notification_read(&self, id: i64) -> Result<()> {
        let id = id.to_string();
        self.put(self.endpoint(PATH_NOTIFICATIONS, &[id.as_str(), "read"])?)
            .await?;
        Ok(())
    }
}

impl AuthApi for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<(String, Principal)> {
        let url = self.endpoint(PATH_LOGIN, &[])?;
        let response = self.http.post(url).json(request).send().await?;
        let status = response.status();
        let body = parse_body(&response.bytes().await?)?;
        match wire::decode_login(&body) {
            Err(DecodeError::Rejected(reason)) => Err(ClientError::LoginRejected(reason)),
            _ if status == StatusCode::UNAUTHORIZED => {
                Err(ClientError::LoginRejected("invalid credentials".to_string()))
            }
            _ if !status.is_success() => Err(ClientError::Status(status.as_u16())),
            decoded => Ok(decoded?),
        }
    }

    async fn profile(&self) -> Result<Principal> {
        let body = self.get(self.endpoint(PATH_PROFILE, &[])?).await?;
        Ok(wire::decode_principal(&body)?)
    }
}
