//! HTTP API gateway for DentAssist.
//!
//! Routes:
//! - `GET  /health`        liveness and version
//! - `POST /ask`           session-scoped question answering
//! - `POST /analyze`       dental photo + symptom analysis (multipart)
//! - `GET  /files/*`       uploaded images (`local_url` mode)
//! - `GET  /sessions/{id}` recorded history of a session
//!
//! Built on Axum; the session store is injected through [`AppState`].

pub mod analyze;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{Method, StatusCode, header};
use axum::response::Json;
use axum::routing::{get, post};
use dentassist_agent::{DentalAgent, ImageAnalyzer};
use dentassist_config::AppConfig;
use dentassist_core::event::{DomainEvent, EventBus};
use dentassist_core::provider::Provider;
use dentassist_core::session::{SessionId, SessionStore, Turn};
use dentassist_memory::{InMemorySessionStore, RetentionPolicy};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub use analyze::UploadSettings;

/// Shared application state for the gateway.
pub struct AppState {
    pub agent: Arc<DentalAgent>,
    pub analyzer: Arc<ImageAnalyzer>,
    pub sessions: Arc<dyn SessionStore>,
    pub uploads: UploadSettings,
    pub event_bus: Arc<EventBus>,
    pub body_limit: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the agent, analyzer and an in-memory session store around
    /// `provider` using `config`.
    pub fn from_config(config: &AppConfig, provider: Arc<dyn Provider>) -> Self {
        let event_bus = Arc::new(EventBus::default());
        Self {
            agent: Arc::new(DentalAgent::from_config(
                config,
                provider.clone(),
                event_bus.clone(),
            )),
            analyzer: Arc::new(ImageAnalyzer::from_config(
                config,
                provider,
                event_bus.clone(),
            )),
            sessions: Arc::new(InMemorySessionStore::with_policy(RetentionPolicy::from(
                &config.sessions,
            ))),
            uploads: UploadSettings::from_config(config),
            event_bus,
            body_limit: config.gateway.body_limit_mb.saturating_mul(1024 * 1024),
        }
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let files = ServeDir::new(&state.uploads.upload_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route("/analyze", post(analyze::analyze_handler))
        .route("/sessions/{id}", get(session_handler))
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = dentassist_providers::build_from_config(&config);
    let state = Arc::new(AppState::from_config(&config, provider));
    spawn_event_logger(&state.event_bus);

    if let Err(e) = tokio::fs::create_dir_all(&state.uploads.upload_dir).await {
        warn!(
            dir = %state.uploads.upload_dir.display(),
            error = %e,
            "Could not create upload directory"
        );
    }

    let app = build_router(state.clone());

    info!(
        addr = %addr,
        model = %config.model,
        mode = ?state.uploads.mode,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Record dispatch and analysis outcomes from the event bus.
pub fn spawn_event_logger(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.as_ref() {
                    DomainEvent::DispatchCompleted {
                        session_id,
                        outcome,
                        error_kind,
                        latency_ms,
                        ..
                    } => info!(
                        session_id = session_id.as_deref().unwrap_or("-"),
                        outcome = outcome.as_str(),
                        error_kind = error_kind.as_deref().unwrap_or("-"),
                        latency_ms,
                        "Dispatch completed"
                    ),
                    DomainEvent::ImageAnalyzed {
                        image_count,
                        success,
                        latency_ms,
                        ..
                    } => info!(image_count, success, latency_ms, "Image analysis finished"),
                    DomainEvent::ToolExecuted { .. } => {}
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub session_id: String,
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

async fn ask_handler(
    State(state): State<SharedState>,
    Json(payload): Json<AskRequest>,
) -> Json<AskResponse> {
    let requested = payload.session_id.map(SessionId::from);

    let (session_id, history) = match state.sessions.get_or_create(requested.clone()).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(error = %e, "Session lookup failed, answering without history");
            (requested.unwrap_or_default(), Vec::new())
        }
    };

    info!(
        session_id = %session_id,
        history = history.len(),
        query_len = payload.query.len(),
        "/ask request"
    );

    record(&state, &session_id, Turn::user(&payload.query)).await;
    let dispatch = state
        .agent
        .dispatch(Some(&session_id), &payload.query, &history)
        .await;
    record(&state, &session_id, Turn::assistant(&dispatch.text)).await;

    Json(AskResponse {
        session_id: session_id.0,
        response: dispatch.text,
    })
}

async fn record(state: &AppState, session_id: &SessionId, turn: Turn) {
    if let Err(e) = state.sessions.append(session_id, turn).await {
        warn!(session_id = %session_id, error = %e, "Failed to record turn");
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

async fn session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session_id = SessionId::from(id);
    match state.sessions.history(&session_id).await {
        Ok(Some(turns)) => Ok(Json(SessionResponse {
            session_id: session_id.0,
            turns,
        })),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Session not found: {session_id}"),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
