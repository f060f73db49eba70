//! Hook catalog models and DTOs.
//!
//! Defines the database row struct for `hooks` and the create / update
//! types used by the registry and API layers. The domain-level conversion
//! into [`intake_core::hook::Hook`] lives here so every consumer gets the
//! same body validation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use intake_core::hook::{Hook, HookBody};
use intake_core::types::Timestamp;
use intake_core::CoreError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A hook row from the `hooks` table.
///
/// The body is stored as two nullable text columns (`script`,
/// `field_mapping`); a check constraint guarantees exactly one is set.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HookRow {
    pub id: Uuid,
    pub hook_name: String,
    pub message_type: String,
    pub source_system: Option<String>,
    pub script: Option<String>,
    pub field_mapping: Option<String>,
    pub enabled: bool,
    pub priority: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HookRow {
    /// Convert into the domain hook, parsing the stored body.
    ///
    /// Fails only if a stored body no longer parses (e.g. a row written by
    /// an incompatible version); the registry surfaces that as an internal
    /// error rather than silently skipping the hook.
    pub fn to_domain(&self) -> Result<Hook, CoreError> {
        let body = HookBody::from_parts(self.script.as_deref(), self.field_mapping.as_deref())
            .map_err(|e| {
                CoreError::Internal(format!(
                    "stored body of hook {} is invalid: {e}",
                    self.id
                ))
            })?;
        Ok(Hook {
            hook_id: self.id,
            hook_name: self.hook_name.clone(),
            message_type: self.message_type.clone(),
            source_system: self.source_system.clone(),
            body,
            enabled: self.enabled,
            priority: self.priority,
            updated_at: self.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Input for creating or replacing a hook by name.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertHook {
    pub hook_name: String,
    pub message_type: String,
    pub source_system: Option<String>,
    pub script: Option<String>,
    pub field_mapping: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
}

/// Input for updating an existing hook. All fields optional; the message
/// type and source system of a hook are immutable (delete and recreate to
/// rebind a rule).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHook {
    pub script: Option<String>,
    pub field_mapping: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<i32>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(script: Option<&str>, mapping: Option<&str>) -> HookRow {
        HookRow {
            id: Uuid::from_u128(1),
            hook_name: "normalize-policy".to_string(),
            message_type: "policy_created".to_string(),
            source_system: None,
            script: script.map(String::from),
            field_mapping: mapping.map(String::from),
            enabled: true,
            priority: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn script_row_converts_to_domain() {
        let hook = row(Some("message"), None).to_domain().unwrap();
        assert!(matches!(hook.body, HookBody::Script(_)));
    }

    #[test]
    fn mapping_row_converts_to_domain() {
        let hook = row(None, Some("a = 1;")).to_domain().unwrap();
        assert!(matches!(hook.body, HookBody::Mapping(_)));
    }

    #[test]
    fn corrupt_body_is_an_internal_error() {
        let err = row(Some("1 +"), None).to_domain().unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }
}
