//! Handlers for hook administration.
//!
//! Thin wrappers over [`HookRegistry`]: every mutation validates and
//! persists there, and the registry publishes the control record. Handlers
//! only translate between HTTP and the registry API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use intake_db::models::hook::{UpdateHook, UpsertHook};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /hooks
// ---------------------------------------------------------------------------

/// Create a new hook. 409 when the name is taken, 400 on body syntax errors.
pub async fn create_hook(
    State(state): State<AppState>,
    Json(input): Json<UpsertHook>,
) -> AppResult<impl IntoResponse> {
    let hook = state.registry.create(&input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(hook))))
}

// ---------------------------------------------------------------------------
// PUT /hooks
// ---------------------------------------------------------------------------

/// Create the named hook or replace its mutable fields if it exists.
pub async fn upsert_hook(
    State(state): State<AppState>,
    Json(input): Json<UpsertHook>,
) -> AppResult<impl IntoResponse> {
    let hook = state.registry.upsert(&input).await?;
    Ok(Json(DataResponse::new(hook)))
}

// ---------------------------------------------------------------------------
// GET /hooks
// ---------------------------------------------------------------------------

pub async fn list_hooks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let hooks = state.registry.list().await?;
    tracing::debug!(count = hooks.len(), "Listed hooks");
    Ok(Json(DataResponse::new(hooks)))
}

// ---------------------------------------------------------------------------
// GET /hooks/{id}
// ---------------------------------------------------------------------------

pub async fn get_hook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let hook = state.registry.get(id).await?;
    Ok(Json(DataResponse::new(hook)))
}

// ---------------------------------------------------------------------------
// PUT /hooks/{id}
// ---------------------------------------------------------------------------

/// Partially update a hook. The message type and source system of a hook
/// are immutable; delete and recreate to rebind a rule.
pub async fn update_hook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateHook>,
) -> AppResult<impl IntoResponse> {
    let hook = state.registry.update(id, &input).await?;
    Ok(Json(DataResponse::new(hook)))
}

// ---------------------------------------------------------------------------
// DELETE /hooks/{id}
// ---------------------------------------------------------------------------

pub async fn delete_hook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.registry.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /hooks/{id}/republish
// ---------------------------------------------------------------------------

/// Re-emit one hook's current state on the control channel.
pub async fn republish_hook(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let hook = state.registry.republish(id).await?;
    Ok(Json(DataResponse::new(hook)))
}

// ---------------------------------------------------------------------------
// POST /hooks/republish
// ---------------------------------------------------------------------------

/// Re-emit every stored hook, backfilling freshly subscribed workers.
pub async fn republish_all(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let published = state.registry.republish_all().await?;
    Ok(Json(DataResponse::new(
        serde_json::json!({ "published": published }),
    )))
}
