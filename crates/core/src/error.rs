//! Domain-level error type shared across the workspace.

use uuid::Uuid;

/// Domain errors surfaced by core validation and lookup logic.
///
/// HTTP-specific mapping lives in the API crate; this type stays
/// transport-agnostic.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity could not be found by its id.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Input failed validation (bad syntax, missing field, out of range).
    #[error("{0}")]
    Validation(String),

    /// The operation conflicts with existing state (e.g. duplicate name).
    #[error("{0}")]
    Conflict(String),

    /// An unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}
