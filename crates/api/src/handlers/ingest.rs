//! The signed webhook ingestion path.
//!
//! Unlike the stream entrypoint, ingestion is synchronous: the caller gets
//! the transformed document (or the precise failure) in the response, and
//! every delivery attempt leaves one row in `inbound_webhook_logs`,
//! including rejected ones.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use intake_core::signature;
use intake_db::models::webhook_log::{CreateWebhookLog, WebhookLogStatus};
use intake_db::repositories::webhook_log_repo::WebhookLogRepo;
use intake_pipeline::cache::CompiledBody;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for the ingestion endpoint.
#[derive(Debug, Deserialize)]
pub struct IngestParams {
    /// Source system the delivery claims to originate from. Hooks bound to
    /// a specific source only match when this is supplied.
    pub source: Option<String>,
}

/// Query parameters for listing delivery logs.
#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// POST /ingest/{message_type}
// ---------------------------------------------------------------------------

/// Verify the signature, select and run the best matching hook, log the
/// attempt, and return the transformed document.
pub async fn ingest(
    State(state): State<AppState>,
    Path(message_type): Path<String>,
    Query(params): Query<IngestParams>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let source_system = params.source.unwrap_or_else(|| "webhook".to_string());
    let source_ip = client_ip(&headers);
    let header_snapshot = headers_to_json(&headers);

    let log = |status: WebhookLogStatus, transformed: Option<Value>, error: Option<String>| {
        CreateWebhookLog {
            status,
            source_ip: source_ip.clone(),
            request_headers: header_snapshot.clone(),
            request_body: String::from_utf8_lossy(&body).into_owned(),
            transformed_body: transformed,
            error_message: error,
            entity_id: None,
        }
    };

    // Signature gate. Fails closed: missing header, blank value, or an
    // unset secret all reject the delivery before the body is parsed.
    let provided = headers
        .get(state.config.signature_header.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !signature::verify(&body, provided, &state.config.webhook_secret) {
        record(
            &state,
            log(
                WebhookLogStatus::Rejected,
                None,
                Some("signature verification failed".to_string()),
            ),
        )
        .await;
        tracing::warn!(%message_type, %source_ip, "Rejected webhook delivery");
        return Err(AppError::Unauthorized(
            "Signature verification failed".to_string(),
        ));
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            record(
                &state,
                log(
                    WebhookLogStatus::Failed,
                    None,
                    Some(format!("invalid JSON body: {e}")),
                ),
            )
            .await;
            return Err(AppError::BadRequest(format!("Invalid JSON body: {e}")));
        }
    };

    let Some(hook) = state
        .registry
        .find_best_match(&message_type, &source_system)
        .await?
    else {
        record(
            &state,
            log(
                WebhookLogStatus::Unmatched,
                None,
                Some(format!("no hook matches message type '{message_type}'")),
            ),
        )
        .await;
        tracing::debug!(%message_type, %source_system, "Unmatched webhook delivery");
        return Err(AppError::NoHookMatched(message_type));
    };

    let result = CompiledBody::compile(&hook.body)
        .map_err(|e| format!("hook body failed to compile: {e}"))
        .and_then(|compiled| intake_pipeline::transform::execute(&compiled, &payload));

    match result {
        Ok(transformed) => {
            record(
                &state,
                log(WebhookLogStatus::Accepted, Some(transformed.clone()), None),
            )
            .await;
            tracing::info!(
                %message_type,
                hook_name = %hook.hook_name,
                "Accepted webhook delivery"
            );
            Ok(Json(DataResponse::new(transformed)))
        }
        Err(error_message) => {
            record(
                &state,
                log(WebhookLogStatus::Failed, None, Some(error_message.clone())),
            )
            .await;
            tracing::warn!(
                %message_type,
                hook_name = %hook.hook_name,
                error = %error_message,
                "Failed webhook transformation"
            );
            Err(AppError::TransformFailed(error_message))
        }
    }
}

// ---------------------------------------------------------------------------
// GET /ingest/logs
// ---------------------------------------------------------------------------

/// Most recent delivery attempts, newest first.
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> AppResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let logs = WebhookLogRepo::list_recent(&state.pool, limit).await?;
    Ok(Json(DataResponse::new(logs)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write the delivery log row. Logging failures must not mask the
/// delivery outcome, so they are reported and swallowed.
async fn record(state: &AppState, input: CreateWebhookLog) {
    if let Err(e) = WebhookLogRepo::insert(&state.pool, Uuid::now_v7(), &input).await {
        tracing::error!(error = %e, "Failed to write inbound webhook log");
    }
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let map: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    Value::Object(map)
}
