//! HTTP surface: WebSocket upgrade, login, and a read-only REST API.
//!
//! The upgrade endpoint checks the session token before upgrading, so a
//! rejected client gets a plain HTTP 401 with a human-readable body and no
//! transport session is ever created.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::{ConnectInfo, Path, Query, State, WebSocketUpgrade};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::AdmissionError;
use crate::protocol::OnlineState;
use crate::server::SharedState;
use crate::session;

/// Build the axum router with the WebSocket and REST endpoints.
pub fn router(state: Arc<SharedState>) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/auth/login", post(auth_login))
        .route("/api/v1/health", get(api_health))
        .route("/api/v1/users/{identity}", get(api_user))
        .route("/api/v1/users/{identity}/friends", get(api_friends))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        );

    // Serve the static web client if the directory exists
    if let Some(ref web_dir) = state.config.web_static_dir {
        let dir = std::path::PathBuf::from(web_dir);
        if dir.exists() {
            tracing::info!("Serving web client from {}", dir.display());
            let index_path = dir.join("index.html");
            let serve = tower_http::services::ServeDir::new(&dir)
                .append_index_html_on_directories(true)
                .fallback(tower_http::services::ServeFile::new(index_path));
            app = app.fallback_service(serve);
        } else {
            tracing::warn!("Web static dir not found: {}", dir.display());
        }
    }

    app.with_state(state)
}

// ── WebSocket admission ────────────────────────────────────────────────

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<SharedState>>,
) -> Response {
    let token = match params.token {
        Some(t) if !t.is_empty() => t,
        _ => {
            tracing::info!(%addr, "websocket rejected: {}", AdmissionError::MissingToken);
            return (StatusCode::UNAUTHORIZED, AdmissionError::MissingToken.to_string())
                .into_response();
        }
    };
    let identity = match state.tokens.validate(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(%addr, "websocket rejected: {e}");
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    tracing::info!(%identity, %addr, "websocket admitted");
    ws.on_upgrade(move |socket| session::run(socket, state, identity, addr))
        .into_response()
}

// ── Login ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    email: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn auth_login(
    State(state): State<Arc<SharedState>>,
    Form(form): Form<LoginForm>,
) -> Json<LoginResponse> {
    match state
        .tokens
        .login(&form.username, &form.password, form.email.as_deref())
    {
        Ok(issued) => {
            tracing::info!(identity = %form.username, "login succeeded");
            Json(LoginResponse {
                success: true,
                token: Some(issued.token),
                expires_at: Some(issued.expires_at),
                error: None,
            })
        }
        Err(e) => {
            tracing::info!(identity = %form.username, "login failed: {e}");
            Json(LoginResponse {
                success: false,
                token: None,
                expires_at: None,
                error: Some(e.to_string()),
            })
        }
    }
}

// ── Read-only REST API ─────────────────────────────────────────────────

/// Server start time (set once on first call).
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

#[derive(Serialize)]
struct HealthResponse {
    connections: usize,
    uptime_secs: u64,
}

async fn api_health(State(state): State<Arc<SharedState>>) -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(SystemTime::now);
    let uptime_secs = start.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    Json(HealthResponse {
        connections: state.registry.len(),
        uptime_secs,
    })
}

#[derive(Serialize)]
struct UserResponse {
    identity: String,
    display_name: String,
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    online_state: Option<OnlineState>,
}

async fn api_user(
    State(state): State<Arc<SharedState>>,
    Path(identity): Path<String>,
) -> Result<Json<UserResponse>, StatusCode> {
    let profile = state
        .directory
        .get_profile(&identity)
        .ok_or(StatusCode::NOT_FOUND)?;
    let online_state = state.presence_states.lock().get(&identity).copied();
    Ok(Json(UserResponse {
        identity: profile.identity.clone(),
        display_name: profile.display_name.clone(),
        online: state.registry.lookup(&identity).is_some(),
        online_state,
    }))
}

async fn api_friends(
    State(state): State<Arc<SharedState>>,
    Path(identity): Path<String>,
) -> Json<Vec<String>> {
    Json(state.directory.friends_of(&identity).to_vec())
}
