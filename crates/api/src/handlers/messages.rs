//! The stream entrypoint: enqueue raw messages onto the main channel.
//!
//! For deployments without an external broker, this is how messages enter
//! the worker pool. The handler returns as soon as the message is
//! enqueued; transformation is asynchronous and unmatched messages are
//! silently dropped by the workers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use intake_core::hook::validate_message_type;
use intake_core::message::RawMessage;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueMessage {
    pub message_type: String,
    pub source_system: String,
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// POST /messages
// ---------------------------------------------------------------------------

/// Enqueue one raw message for asynchronous transformation. 202 on
/// success; the assigned message id is returned for correlation.
pub async fn enqueue_message(
    State(state): State<AppState>,
    Json(input): Json<EnqueueMessage>,
) -> AppResult<impl IntoResponse> {
    validate_message_type(&input.message_type).map_err(AppError::Core)?;

    let message = RawMessage {
        message_id: Uuid::now_v7(),
        message_type: input.message_type,
        source_system: input.source_system,
        payload: input.payload,
        received_at: Utc::now(),
    };
    let message_id = message.message_id;

    state.ingest_tx.send(message).await.map_err(|_| {
        AppError::InternalError("main message channel is closed".to_string())
    })?;

    tracing::debug!(%message_id, "Enqueued raw message");
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse::new(json!({ "messageId": message_id }))),
    ))
}
