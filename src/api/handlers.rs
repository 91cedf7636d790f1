//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{ErrorResponse, ModelsResponse, QueuedResponse};
use super::AppState;
use crate::config::SpeechMode;
use crate::runtime::{Snapshot, SseEvent};
use crate::speech::SpeechSignal;
use crate::state_machine::Event;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // User signals
        .route("/api/advance", post(advance))
        .route("/api/hangup", post(hangup))
        // Remote speech subsystem
        .route("/api/speech", post(speech_signal))
        // Observation
        .route("/api/state", get(get_state))
        .route("/api/models", get(list_models))
        .route("/api/stream", get(stream_dialogue))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// User Signals
// ============================================================

async fn advance(State(state): State<AppState>) -> Result<Json<QueuedResponse>, AppError> {
    enqueue(&state, Event::Advance).await
}

async fn hangup(State(state): State<AppState>) -> Result<Json<QueuedResponse>, AppError> {
    enqueue(&state, Event::Hangup).await
}

async fn speech_signal(
    State(state): State<AppState>,
    Json(signal): Json<SpeechSignal>,
) -> Result<Json<QueuedResponse>, AppError> {
    if state.speech_mode != SpeechMode::Remote {
        return Err(AppError::BadRequest(
            "Speech signals are only accepted in remote speech mode".to_string(),
        ));
    }
    enqueue(&state, signal.into_event()).await
}

async fn enqueue(state: &AppState, event: Event) -> Result<Json<QueuedResponse>, AppError> {
    if state.dialogue.snapshot().state.is_terminal() {
        return Err(AppError::BadRequest("Conversation is over".to_string()));
    }

    tracing::debug!(event = event.kind(), "Queueing event");
    state
        .dialogue
        .send_event(event)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(QueuedResponse { queued: true }))
}

// ============================================================
// Observation
// ============================================================

async fn get_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.dialogue.snapshot())
}

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let snapshot = state.dialogue.snapshot();
    let installed = snapshot.conversation.ollama_models();

    Json(ModelsResponse {
        models: installed.iter().cloned().collect(),
        installed: installed.contains(&state.model),
        model: state.model,
    })
}

async fn stream_dialogue(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before reading the snapshot so no update falls in between
    let broadcast_rx = state.dialogue.subscribe();
    let snapshot = state.dialogue.snapshot();
    sse_stream(SseEvent::Init { snapshot }, broadcast_rx)
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("voice-dm ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
