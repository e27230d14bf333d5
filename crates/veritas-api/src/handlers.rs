//! Route handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use veritas_core::{QaPair, StreamEvent};
use veritas_rag::history::pair_up;
use veritas_rag::RagError;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.len(),
    })
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /auth/session - issue a session token for a user (admin only).
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user_id = body.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    if user_id.chars().count() > 128 {
        return Err(ApiError::BadRequest(
            "user_id must be at most 128 characters".to_string(),
        ));
    }
    let session = state.sessions.issue(user_id);
    tracing::info!(user_id, "Session created");
    Ok(Json(SessionResponse {
        token: session.token,
        user_id: session.user_id,
        expires_at: session.expires_at,
    }))
}

// =============================================================================
// Chat
// =============================================================================

/// How `/chat/ask` delivers its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// One JSON body once the answer is accepted.
    #[default]
    Off,
    /// Plain text with progress markers, then the answer tokens.
    Answer,
    /// Server-sent events carrying every raw stream event.
    Detail,
}

/// Raw `stream` field: a boolean or a mode name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StreamParam {
    Flag(bool),
    Mode(String),
}

impl TryFrom<Option<StreamParam>> for StreamMode {
    type Error = ApiError;

    fn try_from(param: Option<StreamParam>) -> Result<Self, Self::Error> {
        match param {
            None | Some(StreamParam::Flag(false)) => Ok(StreamMode::Off),
            Some(StreamParam::Flag(true)) => Ok(StreamMode::Answer),
            Some(StreamParam::Mode(mode)) => match mode.as_str() {
                "answer" => Ok(StreamMode::Answer),
                "detail" => Ok(StreamMode::Detail),
                other => Err(ApiError::BadRequest(format!(
                    "Unknown stream mode '{}': expected true, false, \"answer\" or \"detail\"",
                    other
                ))),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    stream: Option<StreamParam>,
}

impl AskRequest {
    pub fn mode(&mut self) -> Result<StreamMode, ApiError> {
        StreamMode::try_from(self.stream.take())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub status: String,
    pub generate_count: u32,
    /// The attempt ceiling ended the turn before the answer was verified.
    pub exhausted: bool,
}

/// POST /chat/ask
pub async fn ask(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(mut body): Json<AskRequest>,
) -> Result<Response, ApiError> {
    let mode = body.mode()?;
    state.orchestrator.validate_question(&body.question)?;

    match mode {
        StreamMode::Off => {
            let outcome = state
                .orchestrator
                .answer(&body.question, user_id.as_deref())
                .await?;
            Ok(Json(AskResponse {
                answer: outcome.generation,
                status: "success".to_string(),
                generate_count: outcome.generate_count,
                exhausted: outcome.exhausted,
            })
            .into_response())
        }
        StreamMode::Answer => {
            let events = state.orchestrator.clone().stream(body.question, user_id);
            let text = events.filter_map(|item| {
                let text = narrate(item);
                (!text.is_empty()).then_some(Ok::<_, Infallible>(text))
            });
            Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(text),
            )
                .into_response())
        }
        StreamMode::Detail => {
            let events = state.orchestrator.clone().stream(body.question, user_id);
            let sse = events.map(|item| Ok::<_, Infallible>(to_sse_event(item)));
            Ok(Sse::new(sse)
                .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
                .into_response())
        }
    }
}

/// Text shown for one stream item in answer mode.
pub fn narrate(item: Result<StreamEvent, RagError>) -> String {
    match item {
        Ok(event) => event.narration().to_string(),
        Err(e) => format!("\n[Error: {}]\n", ApiError::from(e).message()),
    }
}

/// SSE frame for one stream item in detail mode.
pub fn to_sse_event(item: Result<StreamEvent, RagError>) -> Event {
    match item {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Event::default().event("message").data(data)
        }
        Err(e) => {
            let data = serde_json::to_string(&ApiError::from(e).body()).unwrap_or_default();
            Event::default().event("error").data(data)
        }
    }
}

/// GET /chat/history - stored question/answer pairs for the current user.
pub async fn history(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<QaPair>>, ApiError> {
    let turns = state.orchestrator.history(user_id.as_deref()).await?;
    Ok(Json(pair_up(&turns)))
}
