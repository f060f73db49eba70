//! HTTP handlers, one module per resource.

pub mod health;
pub mod hooks;
pub mod ingest;
pub mod messages;
