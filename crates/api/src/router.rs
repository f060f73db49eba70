//! Route table.
//!
//! ```text
//! GET    /health                        -> health_check
//! POST   /api/v1/hooks                  -> create_hook
//! PUT    /api/v1/hooks                  -> upsert_hook (by name)
//! GET    /api/v1/hooks                  -> list_hooks
//! GET    /api/v1/hooks/{id}             -> get_hook
//! PUT    /api/v1/hooks/{id}             -> update_hook
//! DELETE /api/v1/hooks/{id}             -> delete_hook
//! POST   /api/v1/hooks/{id}/republish   -> republish_hook
//! POST   /api/v1/hooks/republish        -> republish_all
//! POST   /api/v1/ingest/{message_type}  -> ingest (signed webhook)
//! GET    /api/v1/ingest/logs            -> list_logs
//! POST   /api/v1/messages               -> enqueue_message
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{health, hooks, ingest, messages};
use crate::state::AppState;

/// Root-level routes (not under `/api/v1`).
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/hooks",
            post(hooks::create_hook)
                .put(hooks::upsert_hook)
                .get(hooks::list_hooks),
        )
        .route("/hooks/republish", post(hooks::republish_all))
        .route(
            "/hooks/{id}",
            get(hooks::get_hook)
                .put(hooks::update_hook)
                .delete(hooks::delete_hook),
        )
        .route("/hooks/{id}/republish", post(hooks::republish_hook))
        .route("/ingest/logs", get(ingest::list_logs))
        .route("/ingest/{message_type}", post(ingest::ingest))
        .route("/messages", post(messages::enqueue_message))
}
