//! Chat page and JSON API.
//!
//! Every session owns its API key and transcript. Each chat turn builds a
//! fresh provider and agent from that key, so nothing but the displayed
//! transcript survives between turns.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::session::{ChatEntry, SessionStore};
use crate::{AgentError, GroqProvider, LlmProvider};

const INDEX_HTML: &str = include_str!("../static/index.html");
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Builds the provider for one turn from the session's API key.
pub type ProviderFactory =
    Arc<dyn Fn(&Settings, &str) -> Result<Box<dyn LlmProvider>, AgentError> + Send + Sync>;

pub fn groq_factory() -> ProviderFactory {
    Arc::new(|settings: &Settings, api_key: &str| {
        let provider = GroqProvider::with_base_url(&settings.base_url, api_key, &settings.model)?;
        Ok(Box::new(provider) as Box<dyn LlmProvider>)
    })
}

pub struct AppState {
    pub settings: Settings,
    pub sessions: SessionStore,
    provider_factory: ProviderFactory,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self::with_provider_factory(settings, groq_factory())
    }

    pub fn with_provider_factory(settings: Settings, provider_factory: ProviderFactory) -> Self {
        Self {
            settings,
            sessions: SessionStore::new(),
            provider_factory,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", delete(delete_session))
        .route("/api/sessions/{id}/key", put(update_key))
        .route("/api/sessions/{id}/messages", get(list_messages).delete(clear_messages))
        .route("/api/sessions/{id}/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Periodically drops sessions idle for longer than `ttl`.
pub fn spawn_session_sweeper(state: Arc<AppState>, ttl: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let pruned = state.sessions.prune_older_than(ttl).await;
            if pruned > 0 {
                info!(pruned, "expired idle sessions");
            } else {
                debug!("no idle sessions to expire");
            }
        }
    })
}

/// Bind and serve until Ctrl+C.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.addr();
    let ttl = settings.session_ttl();
    let state = Arc::new(AppState::new(settings));
    let sweeper = spawn_session_sweeper(state.clone(), ttl, SWEEP_INTERVAL.min(ttl));
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("research agent listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    sweeper.abort();
    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct KeyRequest {
    api_key: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

#[derive(Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub used_tools: bool,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

pub enum WebError {
    Agent(AgentError),
    BadRequest(String),
}

impl From<AgentError> for WebError {
    fn from(err: AgentError) -> Self {
        WebError::Agent(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error, kind) = match self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BadRequest"),
            WebError::Agent(err) => {
                let status = match &err {
                    AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                    AgentError::Config(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, err.to_string(), err.kind())
            }
        };
        (status, Json(ErrorResponse { error, kind: kind.to_string() })).into_response()
    }
}

// === Handlers ===

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KeyRequest>,
) -> Result<impl IntoResponse, WebError> {
    let session_id = state.sessions.create(&req.api_key).await?;
    info!(session = %session_id, "session created");
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id })))
}

async fn update_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<KeyRequest>,
) -> Result<StatusCode, WebError> {
    state.sessions.set_api_key(id, &req.api_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, WebError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AgentError::SessionNotFound(id.to_string()).into())
    }
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatEntry>>, WebError> {
    Ok(Json(state.sessions.transcript(id).await?))
}

async fn clear_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, WebError> {
    state.sessions.clear(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, WebError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(WebError::BadRequest("Prompt is empty".into()));
    }

    let _turn = state.sessions.begin_turn(id).await?;
    let api_key = state.sessions.api_key(id).await?;
    state.sessions.push(id, ChatEntry::user(prompt)).await?;
    info!(session = %id, "turn started");

    let result = match (state.provider_factory)(&state.settings, &api_key) {
        Ok(provider) => state.settings.answer(provider, prompt).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            state
                .sessions
                .push(id, ChatEntry::assistant(output.answer.clone()))
                .await?;
            info!(session = %id, used_tools = output.used_tools, "turn finished");
            Ok(Json(ChatResponse {
                answer: output.answer,
                used_tools: output.used_tools,
            }))
        }
        Err(e) => {
            warn!(session = %id, kind = e.kind(), "turn failed: {e}");
            Err(e.into())
        }
    }
}
