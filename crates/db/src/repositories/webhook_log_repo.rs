//! Repository for the `inbound_webhook_logs` table.
//!
//! Logs are written once per delivery attempt and never mutated.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::webhook_log::{CreateWebhookLog, InboundWebhookLog};

const LOG_COLUMNS: &str = "\
    id, received_at, status, source_ip, request_headers, request_body, \
    transformed_body, error_message, entity_id";

/// Insert and list inbound webhook delivery logs.
pub struct WebhookLogRepo;

impl WebhookLogRepo {
    /// Record one delivery attempt.
    pub async fn insert(
        pool: &PgPool,
        id: Uuid,
        input: &CreateWebhookLog,
    ) -> Result<InboundWebhookLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO inbound_webhook_logs \
                 (id, status, source_ip, request_headers, request_body, \
                  transformed_body, error_message, entity_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {LOG_COLUMNS}"
        );
        sqlx::query_as::<_, InboundWebhookLog>(&query)
            .bind(id)
            .bind(input.status.as_str())
            .bind(&input.source_ip)
            .bind(&input.request_headers)
            .bind(&input.request_body)
            .bind(&input.transformed_body)
            .bind(&input.error_message)
            .bind(&input.entity_id)
            .fetch_one(pool)
            .await
    }

    /// Most recent delivery attempts, newest first.
    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<InboundWebhookLog>, sqlx::Error> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM inbound_webhook_logs \
             ORDER BY received_at DESC \
             LIMIT $1"
        );
        sqlx::query_as::<_, InboundWebhookLog>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
