//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::game::controls::{default_bindings, KeyBinding};
use crate::game::r#match::SessionError;
use crate::game::variant::{ArenaConfig, CombatConfig, Variant};
use crate::game::SessionStatus;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/variants", get(variants_handler))
        .route("/sessions", get(list_sessions_handler).post(create_session_handler))
        .route(
            "/sessions/:id",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/:id/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    active_connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.sessions.active_sessions(),
        active_connections: state.sessions.total_connections(),
    })
}

// ============================================================================
// Variant catalog
// ============================================================================

#[derive(Serialize)]
struct VariantInfo {
    id: Variant,
    title: &'static str,
    description: &'static str,
    max_health: u32,
    max_energy: u32,
    starting_energy: u32,
    rounds_to_win: u32,
    arena: ArenaConfig,
    bindings: Vec<KeyBinding>,
}

async fn variants_handler(State(state): State<AppState>) -> Json<Vec<VariantInfo>> {
    let variants = Variant::ALL
        .into_iter()
        .map(|variant| {
            let config = CombatConfig::for_variant(variant)
                .with_rounds_to_win(state.config.rounds_to_win);
            VariantInfo {
                id: variant,
                title: variant.title(),
                description: variant.description(),
                max_health: config.max_health,
                max_energy: config.max_energy,
                starting_energy: config.starting_energy,
                rounds_to_win: config.rounds_to_win,
                arena: config.arena,
                bindings: default_bindings(&config),
            }
        })
        .collect();

    Json(variants)
}

// ============================================================================
// Session endpoints
// ============================================================================

#[derive(Deserialize)]
struct CreateSessionRequest {
    variant: Variant,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session: SessionStatus,
    ws_url: String,
}

async fn create_session_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let handle = state.sessions.spawn(req.variant)?;
    let ws_url = state.config.session_ws_url(&handle.id);

    info!(session_id = %handle.id, variant = ?req.variant, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session: handle.status(),
            ws_url,
        }),
    ))
}

async fn list_sessions_handler(State(state): State<AppState>) -> Json<Vec<SessionStatus>> {
    Json(state.sessions.list())
}

async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, AppError> {
    let handle = state.sessions.get(&id).ok_or(SessionError::NotFound(id))?;
    Ok(Json(handle.status()))
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.shutdown(&id, "closed by request").await?;
    info!(session_id = %id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) | SessionError::Closed => AppError::NotFound(err.to_string()),
            SessionError::LimitReached(_) => AppError::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
