//! Hook registry service.
//!
//! Single write path for the hook catalog: every mutation validates the
//! body, persists through [`HookRepo`], then publishes a control record on
//! the bus so worker state converges. Reads bypass the bus entirely.

use sqlx::PgPool;
use uuid::Uuid;

use intake_core::control::{ControlRecord, Operation};
use intake_core::hook::{self, Hook, HookBody};
use intake_core::CoreError;
use intake_db::models::hook::{HookRow, UpdateHook, UpsertHook};
use intake_db::repositories::hook_repo::HookRepo;

use crate::bus::ControlBus;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Hook not found: {0}")]
    NotFound(Uuid),

    #[error("A hook named '{0}' already exists")]
    NameConflict(String),

    #[error(
        "Hook '{name}' is bound to message type '{message_type}'; \
         re-keying a hook requires deleting and recreating it"
    )]
    KeyConflict { name: String, message_type: String },

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Map a unique-constraint violation on the hook name to a conflict error.
fn classify_insert_error(err: sqlx::Error, hook_name: &str) -> RegistryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("uq_hooks_hook_name") {
            return RegistryError::NameConflict(hook_name.to_string());
        }
    }
    RegistryError::Database(err)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct HookRegistry {
    pool: PgPool,
    bus: ControlBus,
}

impl HookRegistry {
    pub fn new(pool: PgPool, bus: ControlBus) -> Self {
        Self { pool, bus }
    }

    pub fn bus(&self) -> &ControlBus {
        &self.bus
    }

    fn validate(input: &UpsertHook) -> Result<(), RegistryError> {
        hook::validate_hook_name(&input.hook_name)?;
        hook::validate_message_type(&input.message_type)?;
        HookBody::from_parts(input.script.as_deref(), input.field_mapping.as_deref())?;
        Ok(())
    }

    fn publish(&self, hook: &Hook, operation: Operation) {
        tracing::info!(
            hook_id = %hook.hook_id,
            hook_name = %hook.hook_name,
            message_type = %hook.message_type,
            operation = %operation,
            "Publishing hook control record"
        );
        self.bus.publish(ControlRecord::from_hook(hook, operation));
    }

    fn to_domain(row: &HookRow) -> Result<Hook, RegistryError> {
        Ok(row.to_domain()?)
    }

    /// A hook's (message type, source system) key is immutable once created;
    /// replacing by name must not silently leave the old key in effect.
    fn ensure_same_key(existing: &HookRow, input: &UpsertHook) -> Result<(), RegistryError> {
        if existing.message_type != input.message_type
            || existing.source_system != input.source_system
        {
            return Err(RegistryError::KeyConflict {
                name: existing.hook_name.clone(),
                message_type: existing.message_type.clone(),
            });
        }
        Ok(())
    }

    // -- Mutations ----------------------------------------------------------

    /// Create a new hook and publish an INSERT control record.
    ///
    /// Ids are time-ordered (UUIDv7), so the deterministic tie-break on
    /// ascending id favors the older of two equal-priority hooks.
    pub async fn create(&self, input: &UpsertHook) -> Result<Hook, RegistryError> {
        Self::validate(input)?;
        let row = HookRepo::create(&self.pool, Uuid::now_v7(), input)
            .await
            .map_err(|e| classify_insert_error(e, &input.hook_name))?;
        let hook = Self::to_domain(&row)?;
        self.publish(&hook, Operation::Insert);
        Ok(hook)
    }

    /// Create the named hook, or replace its mutable fields if it already
    /// exists. Publishes INSERT or UPDATE accordingly.
    ///
    /// Replacement keeps the hook's key: an input whose message type or
    /// source system differs from the stored row is rejected with
    /// [`RegistryError::KeyConflict`] before anything is written.
    pub async fn upsert(&self, input: &UpsertHook) -> Result<Hook, RegistryError> {
        Self::validate(input)?;
        if let Some(existing) = HookRepo::find_by_name(&self.pool, &input.hook_name).await? {
            Self::ensure_same_key(&existing, input)?;
        }
        if let Some(row) = HookRepo::replace_by_name(&self.pool, input).await? {
            let hook = Self::to_domain(&row)?;
            self.publish(&hook, Operation::Update);
            return Ok(hook);
        }
        let row = HookRepo::create(&self.pool, Uuid::now_v7(), input)
            .await
            .map_err(|e| classify_insert_error(e, &input.hook_name))?;
        let hook = Self::to_domain(&row)?;
        self.publish(&hook, Operation::Insert);
        Ok(hook)
    }

    /// Partially update a hook and publish an UPDATE control record.
    pub async fn update(&self, id: Uuid, input: &UpdateHook) -> Result<Hook, RegistryError> {
        if input.script.is_some() || input.field_mapping.is_some() {
            HookBody::from_parts(input.script.as_deref(), input.field_mapping.as_deref())?;
        }
        let row = HookRepo::update(&self.pool, id, input)
            .await?
            .ok_or(RegistryError::NotFound(id))?;
        let hook = Self::to_domain(&row)?;
        self.publish(&hook, Operation::Update);
        Ok(hook)
    }

    /// Delete a hook. The DELETE control record is published only when a
    /// row was actually removed.
    pub async fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        let row = HookRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;
        if !HookRepo::delete(&self.pool, id).await? {
            return Err(RegistryError::NotFound(id));
        }
        let hook = Self::to_domain(&row)?;
        self.publish(&hook, Operation::Delete);
        Ok(())
    }

    // -- Reads --------------------------------------------------------------

    pub async fn get(&self, id: Uuid) -> Result<Hook, RegistryError> {
        let row = HookRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;
        Self::to_domain(&row)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Hook>, RegistryError> {
        match HookRepo::find_by_name(&self.pool, name).await? {
            Some(row) => Ok(Some(Self::to_domain(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<Hook>, RegistryError> {
        let rows = HookRepo::list(&self.pool).await?;
        rows.iter().map(Self::to_domain).collect()
    }

    /// Registry-side exact lookup for the synchronous webhook path: the
    /// winning enabled hook for one (message type, source system) key, with
    /// NULL-source rows as wildcard candidates.
    pub async fn find_best_match(
        &self,
        message_type: &str,
        source_system: &str,
    ) -> Result<Option<Hook>, RegistryError> {
        match HookRepo::find_best_match(&self.pool, message_type, source_system).await? {
            Some(row) => Ok(Some(Self::to_domain(&row)?)),
            None => Ok(None),
        }
    }

    // -- Republishing -------------------------------------------------------

    /// Re-emit one hook's current state as an UPDATE record.
    pub async fn republish(&self, id: Uuid) -> Result<Hook, RegistryError> {
        let hook = self.get(id).await?;
        self.publish(&hook, Operation::Update);
        Ok(hook)
    }

    /// Re-emit every stored hook as an UPDATE record so freshly subscribed
    /// workers reconstruct the full live set. Hooks whose stored body no
    /// longer parses are skipped with an error log instead of aborting the
    /// replay.
    pub async fn republish_all(&self) -> Result<usize, RegistryError> {
        let rows = HookRepo::list(&self.pool).await?;
        let mut published = 0usize;
        for row in &rows {
            match row.to_domain() {
                Ok(hook) => {
                    self.publish(&hook, Operation::Update);
                    published += 1;
                }
                Err(e) => {
                    tracing::error!(hook_id = %row.id, error = %e, "Skipping unreplayable hook");
                }
            }
        }
        tracing::info!(published, total = rows.len(), "Republished hook catalog");
        Ok(published)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn input(script: Option<&str>, mapping: Option<&str>) -> UpsertHook {
        UpsertHook {
            hook_name: "normalize-policy".to_string(),
            message_type: "policy_created".to_string(),
            source_system: None,
            script: script.map(String::from),
            field_mapping: mapping.map(String::from),
            enabled: None,
            priority: None,
        }
    }

    #[test]
    fn validation_rejects_empty_name() {
        let mut bad = input(Some("1"), None);
        bad.hook_name = "  ".to_string();
        assert_matches!(
            HookRegistry::validate(&bad),
            Err(RegistryError::Invalid(CoreError::Validation(_)))
        );
    }

    #[test]
    fn validation_rejects_bodyless_input() {
        assert!(HookRegistry::validate(&input(None, None)).is_err());
    }

    #[test]
    fn validation_rejects_invalid_script() {
        assert!(HookRegistry::validate(&input(Some("1 +"), None)).is_err());
    }

    #[test]
    fn validation_accepts_a_mapping_body() {
        assert!(HookRegistry::validate(&input(None, Some("total = amount * 2;"))).is_ok());
    }

    fn stored_row(message_type: &str, source_system: Option<&str>) -> HookRow {
        let now = chrono::Utc::now();
        HookRow {
            id: Uuid::now_v7(),
            hook_name: "normalize-policy".to_string(),
            message_type: message_type.to_string(),
            source_system: source_system.map(String::from),
            script: Some("1".to_string()),
            field_mapping: None,
            enabled: true,
            priority: 100,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn upsert_keeps_the_stored_key() {
        let row = stored_row("policy_created", None);
        assert!(HookRegistry::ensure_same_key(&row, &input(Some("1"), None)).is_ok());
    }

    #[test]
    fn upsert_rejects_a_message_type_change() {
        let row = stored_row("claim_created", None);
        assert_matches!(
            HookRegistry::ensure_same_key(&row, &input(Some("1"), None)),
            Err(RegistryError::KeyConflict { message_type, .. }) if message_type == "claim_created"
        );
    }

    #[test]
    fn upsert_rejects_a_source_system_change() {
        let row = stored_row("policy_created", Some("crm"));
        assert_matches!(
            HookRegistry::ensure_same_key(&row, &input(Some("1"), None)),
            Err(RegistryError::KeyConflict { .. })
        );
    }
}
