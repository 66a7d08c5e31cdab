//! HTTP/SSE Handlers

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header::HeaderName},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use agent_core::{AgentError, SessionId, TurnEvent, TurnKey, TurnOutcome, TurnResult};

use crate::state::AppState;

/// Response header carrying the session id of a streamed turn
pub const SESSION_HEADER: &str = "x-session-id";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToolCallSummary {
    pub name: String,
    pub args: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub version: u64,
    pub tool_calls: Vec<ToolCallSummary>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Whether repeating the same request may succeed
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            retryable: false,
        }),
    )
}

/// Status, code and retry hint of a core error
fn agent_error(error: &AgentError) -> ApiError {
    let status = match error {
        AgentError::AdapterUnavailable(_) | AgentError::AdapterContract(_) => {
            StatusCode::BAD_GATEWAY
        }
        AgentError::VersionConflict { .. } => StatusCode::CONFLICT,
        AgentError::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.user_message(),
            code: error.code().into(),
            retryable: error.is_retryable(),
        }),
    )
}

/// Validate the message and pick (or mint) the session id
fn prepare(message: &str, session_id: Option<String>) -> Result<SessionId, ApiError> {
    if message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Message cannot be empty",
            "INVALID_INPUT",
        ));
    }
    Ok(SessionId::or_generate(session_id))
}

/// Map a turn that did not complete onto an HTTP error
fn turn_error(result: &TurnResult) -> ApiError {
    match &result.outcome {
        TurnOutcome::Completed { .. } => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Turn completed without an answer",
            "INTERNAL_ERROR",
        ),
        TurnOutcome::Capped { iterations } => api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Stopped after {iterations} tool rounds without a final answer"),
            "TURN_CAPPED",
        ),
        TurnOutcome::Cancelled => api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Turn was cancelled",
            "TURN_CANCELLED",
        ),
        TurnOutcome::Failed { error } => agent_error(error),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider_connected,
    })
}

/// Models the provider can serve
pub async fn list_models(
    State(state): State<AppState>,
) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.provider.list_models().await.map_err(|e| {
        tracing::warn!("Model listing failed: {}", e);
        agent_error(&e)
    })?;

    Ok(Json(ModelsResponse {
        models: models.into_iter().map(|m| m.id).collect(),
    }))
}

/// Main chat endpoint (non-streaming)
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = prepare(&payload.message, payload.session_id)?;

    // The turn runs in its own task so a dropped connection cancels it cleanly
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let controller = state.controller.clone();
    let turn = tokio::spawn(async move {
        controller
            .run_turn(TurnKey::new(session_id), payload.message, cancel)
            .await
    });

    let result = turn.await.map_err(|e| {
        tracing::error!("Turn task failed: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An unexpected error occurred.",
            "INTERNAL_ERROR",
        )
    })?;
    guard.disarm();

    let Some(answer) = result.answer() else {
        return Err(turn_error(&result));
    };

    Ok(Json(ChatResponse {
        response: answer.to_string(),
        session_id: result.session_id.to_string(),
        version: result.version,
        tool_calls: result
            .tool_calls()
            .into_iter()
            .map(|(name, args)| ToolCallSummary {
                name: name.to_string(),
                args: args.clone(),
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Server-sent events for one turn; closing the connection cancels the turn
pub async fn chat_stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    let session_id = prepare(&query.message, query.session_id)?;
    let header = HeaderValue::from_str(session_id.as_str()).map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            "Session id is not a valid header value",
            "INVALID_INPUT",
        )
    })?;

    // Subscribe before the turn starts so no event is missed
    let controller = state.controller.clone();
    let key = TurnKey::new(session_id);
    let subscription = controller.events().subscribe(&key);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        let result = controller.run_turn(key, query.message, cancel).await;
        tracing::debug!(
            session_id = %result.session_id,
            version = result.version,
            events = result.events.len(),
            "Streamed turn finished"
        );
    });

    // The guard lives inside the stream; dropping the response body cancels the turn
    let stream = futures::stream::unfold(
        (subscription, guard),
        |(mut subscription, guard)| async move {
            let event = subscription.recv().await?;
            Some((sse_event(&event), (subscription, guard)))
        },
    );

    Ok((
        [(HeaderName::from_static(SESSION_HEADER), header)],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

fn sse_event(event: &TurnEvent) -> Result<SseEvent, Infallible> {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".into());
    Ok(SseEvent::default().event(event.event_type()).data(data))
}
