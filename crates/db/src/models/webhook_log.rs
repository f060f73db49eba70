//! Inbound webhook delivery log models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use intake_core::types::Timestamp;
use intake_core::CoreError;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Outcome of one webhook delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookLogStatus {
    /// Signature verified and transformation succeeded.
    Accepted,
    /// Signature verification failed; the payload never reached evaluation.
    Rejected,
    /// Signature verified but the transformation failed.
    Failed,
    /// Signature verified but no hook matched the message type.
    Unmatched,
}

impl WebhookLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
            Self::Unmatched => "unmatched",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "failed" => Ok(Self::Failed),
            "unmatched" => Ok(Self::Unmatched),
            _ => Err(CoreError::Validation(format!(
                "Invalid webhook log status: '{s}'. Must be one of: accepted, rejected, failed, unmatched"
            ))),
        }
    }
}

impl std::fmt::Display for WebhookLogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `inbound_webhook_logs` table. Rows are insert-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InboundWebhookLog {
    pub id: Uuid,
    pub received_at: Timestamp,
    pub status: String,
    pub source_ip: String,
    pub request_headers: serde_json::Value,
    pub request_body: String,
    pub transformed_body: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub entity_id: Option<String>,
}

/// Input for recording a webhook delivery attempt.
#[derive(Debug, Clone)]
pub struct CreateWebhookLog {
    pub status: WebhookLogStatus,
    pub source_ip: String,
    pub request_headers: serde_json::Value,
    pub request_body: String,
    pub transformed_body: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub entity_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            WebhookLogStatus::Accepted,
            WebhookLogStatus::Rejected,
            WebhookLogStatus::Failed,
            WebhookLogStatus::Unmatched,
        ] {
            assert_eq!(WebhookLogStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_rejects() {
        assert!(WebhookLogStatus::from_str("pending").is_err());
    }
}
