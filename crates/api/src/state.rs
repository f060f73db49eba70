use std::sync::Arc;

use tokio::sync::mpsc;

use intake_core::message::RawMessage;
use intake_events::HookRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: intake_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Hook catalog service: validate, persist, publish.
    pub registry: Arc<HookRegistry>,
    /// Producer side of the main message channel the workers consume.
    pub ingest_tx: mpsc::Sender<RawMessage>,
}
