use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use campus_shared::constants::{
    PATH_DIRECTORY, PATH_LOGIN, PATH_MARK_READ, PATH_NOTIFICATIONS, PATH_NOTIFICATION_UNREAD,
    PATH_PROFILE, PATH_SEND, PATH_THREADS, PATH_UNREAD_COUNT,
};
use campus_shared::wire::{
    DirectoryBody, DirectoryResponse, LoginResponse, MessagesResponse,
    NotificationUnreadResponse, ProfileResponse, ThreadsResponse, UnreadResponse, UserProfile,
};
use campus_shared::{
    LoginRequest, MarkReadRequest, Message, Notification, Peer, Principal, Role,
    SendMessageRequest,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::store::{Account, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Store, config: ServerConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(PATH_LOGIN, post(login))
        .route(PATH_PROFILE, get(profile))
        .route(PATH_THREADS, get(threads))
        .route(PATH_UNREAD_COUNT, get(unread_count))
        .route(PATH_DIRECTORY, get(directory))
        .route("/api/messages/with/:role/:id", get(conversation))
        .route(PATH_SEND, post(send_message))
        .route(PATH_MARK_READ, post(mark_read))
        .route(PATH_NOTIFICATIONS, get(notifications))
        .route(PATH_NOTIFICATION_UNREAD, get(notification_unread))
        .route("/api/notifications/:id/read", put(mark_notification_read))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

#[derive(Serialize)]
struct SendResponse {
    success: bool,
    message: Message,
}

#[derive(Serialize)]
struct MarkReadResponse {
    success: bool,
    updated: usize,
}

fn profile_of(account: &Account) -> UserProfile {
    UserProfile {
        user_id: account.user_id.clone(),
        name: account.name.clone(),
        email: account.email.clone(),
        role: account.role,
    }
}

/// Resolve the bearer token to the caller.
async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Principal, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServerError::Unauthorized)?;
    state
        .store
        .authenticate(token)
        .await
        .ok_or(ServerError::Unauthorized)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let (token, account) = state
        .store
        .login(&req.email, &req.password)
        .await
        .ok_or(ServerError::InvalidCredentials)?;
    info!(user = %account.user_id, role = %account.role, "User logged in");
    Ok(Json(LoginResponse {
        success: true,
        token,
        user: profile_of(&account),
    }))
}

async fn profile(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let account = state
        .store
        .account(&me)
        .await
        .ok_or_else(|| ServerError::NotFound("account".into()))?;
    Ok(Json(ProfileResponse {
        user: profile_of(&account),
    }))
}

async fn threads(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ThreadsResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    Ok(Json(ThreadsResponse {
        threads: state.store.threads(&me).await,
    }))
}

async fn unread_count(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<UnreadResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    Ok(Json(UnreadResponse {
        unread: state.store.unread_count(&me).await,
    }))
}

async fn directory(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<DirectoryResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let directory = state.store.directory(&me).await;
    Ok(Json(DirectoryResponse {
        directory: DirectoryBody::from(&directory),
    }))
}

async fn conversation(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path((role, id)): Path<(String, String)>,
) -> Result<Json<MessagesResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let role: Role = role
        .parse()
        .map_err(|e: campus_shared::DecodeError| ServerError::BadRequest(e.to_string()))?;
    let peer = Peer::new(id, role);
    Ok(Json(MessagesResponse {
        messages: state.store.conversation(&me, &peer).await,
    }))
}

async fn send_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendResponse>), ServerError> {
    let me = authenticate(&headers, &state).await?;
    let message = state.store.send(&me, req.peer(), &req.content).await?;
    info!(id = message.id, from = %me.id, to = %req.to_id, "Message stored");
    Ok((
        StatusCode::CREATED,
        Json(SendResponse {
            success: true,
            message,
        }),
    ))
}

async fn mark_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    let updated = state.store.mark_read(&me, &req.from_id, req.from_role).await;
    Ok(Json(MarkReadResponse {
        success: true,
        updated,
    }))
}

async fn notifications(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    Ok(Json(state.store.notifications(&me).await))
}

async fn notification_unread(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<NotificationUnreadResponse>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    Ok(Json(NotificationUnreadResponse {
        unread_count: state.store.notification_unread(&me).await,
    }))
}

async fn mark_notification_read(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, ServerError> {
    let me = authenticate(&headers, &state).await?;
    state
        .store
        .mark_notification_read(&me, id)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("notification {id}")))
}

/// Serve on an already-bound listener.
pub async fn serve_listener(state: AppState, listener: TcpListener) -> anyhow::Result<()> {
    let app = build_router(state);
    info!(addr = %listener.local_addr()?, "Starting HTTP API server");
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(state, listener).await
}
