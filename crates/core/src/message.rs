//! Message envelopes for the main channel and its outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::Timestamp;

/// An integration message as produced by an external source system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub message_id: Uuid,
    pub message_type: String,
    pub source_system: String,
    /// Nested key/value document.
    pub payload: Value,
    pub received_at: Timestamp,
}

/// A successfully normalized message, emitted on the success channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedMessage {
    pub message_id: Uuid,
    /// Name of the hook that produced the result.
    pub hook_name: String,
    pub result_data: Value,
}

/// A message whose transformation failed, emitted on the dead-letter
/// channel. Failures are local: they never abort the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMessage {
    pub message_id: Uuid,
    /// The hook that was applied, if a match was found before the failure.
    pub hook_name: Option<String>,
    pub error_message: String,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn raw_message_wire_format() {
        let msg = RawMessage {
            message_id: Uuid::from_u128(1),
            message_type: "policy_created".to_string(),
            source_system: "legacy_crm".to_string(),
            payload: json!({"a": 1}),
            received_at: Utc::now(),
        };
        let wire = serde_json::to_value(&msg).unwrap();
        assert!(wire.get("messageId").is_some());
        assert!(wire.get("messageType").is_some());
        assert!(wire.get("sourceSystem").is_some());
        assert!(wire.get("receivedAt").is_some());
    }

    #[test]
    fn failed_message_wire_format() {
        let failed = FailedMessage {
            message_id: Uuid::from_u128(1),
            hook_name: None,
            error_message: "boom".to_string(),
            execution_time_ms: 3,
        };
        let wire = serde_json::to_value(&failed).unwrap();
        assert_eq!(wire["errorMessage"], json!("boom"));
        assert_eq!(wire["executionTimeMs"], json!(3));
        assert_eq!(wire["hookName"], json!(null));
    }
}
