//! HTTP surface of the intake service.
//!
//! Thin axum layer over the hook registry and the transform pipeline: hook
//! administration, the signed webhook ingestion path, the stream
//! entrypoint, and health. All domain logic lives in the lower crates.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod state;
