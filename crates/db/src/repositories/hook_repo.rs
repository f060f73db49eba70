//! Repository for the `hooks` table.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::hook::{HookRow, UpdateHook, UpsertHook};

// ---------------------------------------------------------------------------
// Column list
// ---------------------------------------------------------------------------

const HOOK_COLUMNS: &str = "\
    id, hook_name, message_type, source_system, script, field_mapping, \
    enabled, priority, created_at, updated_at";

/// Provides CRUD operations and the best-match lookup for hooks.
pub struct HookRepo;

impl HookRepo {
    /// Create a new hook.
    pub async fn create(pool: &PgPool, id: Uuid, input: &UpsertHook) -> Result<HookRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO hooks \
                 (id, hook_name, message_type, source_system, script, field_mapping, \
                  enabled, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {HOOK_COLUMNS}"
        );
        sqlx::query_as::<_, HookRow>(&query)
            .bind(id)
            .bind(&input.hook_name)
            .bind(&input.message_type)
            .bind(&input.source_system)
            .bind(&input.script)
            .bind(&input.field_mapping)
            .bind(input.enabled.unwrap_or(true))
            .bind(input.priority.unwrap_or(100))
            .fetch_one(pool)
            .await
    }

    /// Replace the mutable fields of an existing hook identified by name,
    /// keeping its id and key. Returns `None` when no such hook exists.
    pub async fn replace_by_name(
        pool: &PgPool,
        input: &UpsertHook,
    ) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!(
            "UPDATE hooks SET \
                 script = $2, \
                 field_mapping = $3, \
                 enabled = $4, \
                 priority = $5, \
                 updated_at = now() \
             WHERE hook_name = $1 \
             RETURNING {HOOK_COLUMNS}"
        );
        sqlx::query_as::<_, HookRow>(&query)
            .bind(&input.hook_name)
            .bind(&input.script)
            .bind(&input.field_mapping)
            .bind(input.enabled.unwrap_or(true))
            .bind(input.priority.unwrap_or(100))
            .fetch_optional(pool)
            .await
    }

    /// Partially update a hook by id. `enabled` and `priority` keep their
    /// value when `None`; the body columns are replaced as a pair whenever
    /// either is supplied, so a hook can switch between script and mapping
    /// without violating the single-body check constraint.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        input: &UpdateHook,
    ) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!(
            "UPDATE hooks SET \
                 script = CASE WHEN $2::text IS NULL AND $3::text IS NULL \
                     THEN script ELSE $2 END, \
                 field_mapping = CASE WHEN $2::text IS NULL AND $3::text IS NULL \
                     THEN field_mapping ELSE $3 END, \
                 enabled = COALESCE($4, enabled), \
                 priority = COALESCE($5, priority), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {HOOK_COLUMNS}"
        );
        sqlx::query_as::<_, HookRow>(&query)
            .bind(id)
            .bind(&input.script)
            .bind(&input.field_mapping)
            .bind(input.enabled)
            .bind(input.priority)
            .fetch_optional(pool)
            .await
    }

    /// Find a hook by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!("SELECT {HOOK_COLUMNS} FROM hooks WHERE id = $1");
        sqlx::query_as::<_, HookRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a hook by its unique name.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!("SELECT {HOOK_COLUMNS} FROM hooks WHERE hook_name = $1");
        sqlx::query_as::<_, HookRow>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// List every hook, ordered for stable admin views and republishing.
    pub async fn list(pool: &PgPool) -> Result<Vec<HookRow>, sqlx::Error> {
        let query = format!(
            "SELECT {HOOK_COLUMNS} FROM hooks ORDER BY message_type, priority, id"
        );
        sqlx::query_as::<_, HookRow>(&query).fetch_all(pool).await
    }

    /// The winning hook for one (message type, source system) key: the
    /// enabled hook with the lowest priority, ties broken by ascending id.
    /// A NULL `source_system` row is a wildcard candidate for any source.
    pub async fn find_best_match(
        pool: &PgPool,
        message_type: &str,
        source_system: &str,
    ) -> Result<Option<HookRow>, sqlx::Error> {
        let query = format!(
            "SELECT {HOOK_COLUMNS} FROM hooks \
             WHERE message_type = $1 \
               AND enabled \
               AND (source_system = $2 OR source_system IS NULL) \
             ORDER BY priority ASC, id ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, HookRow>(&query)
            .bind(message_type)
            .bind(source_system)
            .fetch_optional(pool)
            .await
    }

    /// Delete a hook by id. Returns whether a row was removed.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM hooks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
