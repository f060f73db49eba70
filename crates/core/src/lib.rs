//! Intake domain logic.
//!
//! Pure, dependency-light building blocks shared by the registry, the
//! control plane, the stream pipeline, and the webhook ingestion path:
//!
//! - [`expr`] — the sandboxed expression language (compile + evaluate).
//! - [`mapping`] — declarative `target = expression;` field mappings.
//! - [`hook`] — transformation-rule domain types and validation.
//! - [`control`] — control-channel change records.
//! - [`message`] — raw / transformed / failed message envelopes.
//! - [`signature`] — HMAC-SHA256 webhook signature verification.
//!
//! This crate has no internal dependencies so it can be used from every
//! other crate in the workspace.

pub mod control;
pub mod error;
pub mod expr;
pub mod hook;
pub mod mapping;
pub mod message;
pub mod signature;
pub mod types;

pub use error::CoreError;
