//! Control-channel change records.
//!
//! Every hook mutation produces exactly one [`ControlRecord`] that is fanned
//! out to all pipeline workers. Records are idempotent: replaying one, or
//! applying an older record after a newer one for the same hook, never
//! regresses worker state (last-write-wins on `updated_at`; DELETE always
//! removes).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hook::{Hook, HookBody};
use crate::mapping::FieldMapping;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The kind of mutation a control record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ControlRecord
// ---------------------------------------------------------------------------

/// The wire record for one hook mutation.
///
/// Besides the key and body, the record carries `hook_name`,
/// `source_system`, and `priority`: workers need them to select among
/// multiple hooks per message type and to label their output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRecord {
    pub hook_id: Uuid,
    pub hook_name: String,
    pub message_type: String,
    pub source_system: Option<String>,
    /// Script source; mutually exclusive with `field_mapping`.
    pub script: Option<String>,
    /// Parsed mapping entries; mutually exclusive with `script`.
    pub field_mapping: Option<FieldMapping>,
    pub enabled: bool,
    pub priority: i32,
    pub updated_at: Timestamp,
    pub operation: Operation,
}

impl ControlRecord {
    /// Build the record describing a hook's current state.
    pub fn from_hook(hook: &Hook, operation: Operation) -> Self {
        let (script, field_mapping) = match &hook.body {
            HookBody::Script(source) => (Some(source.clone()), None),
            HookBody::Mapping(mapping) => (None, Some(mapping.clone())),
        };
        Self {
            hook_id: hook.hook_id,
            hook_name: hook.hook_name.clone(),
            message_type: hook.message_type.clone(),
            source_system: hook.source_system.clone(),
            script,
            field_mapping,
            enabled: hook.enabled,
            priority: hook.priority,
            updated_at: hook.updated_at,
            operation,
        }
    }

    /// Reconstruct the hook this record describes. `None` for DELETE
    /// records, which carry no body.
    pub fn to_hook(&self) -> Option<Hook> {
        let body = match (&self.script, &self.field_mapping) {
            (Some(script), None) => HookBody::Script(script.clone()),
            (None, Some(mapping)) => HookBody::Mapping(mapping.clone()),
            _ => return None,
        };
        Some(Hook {
            hook_id: self.hook_id,
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
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_hook() -> Hook {
        Hook {
            hook_id: Uuid::from_u128(42),
            hook_name: "normalize-policy".to_string(),
            message_type: "policy_created".to_string(),
            source_system: None,
            body: HookBody::Mapping(FieldMapping::parse("a = 1;").unwrap()),
            enabled: true,
            priority: 10,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let record = ControlRecord::from_hook(&sample_hook(), Operation::Insert);
        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["hookId"], json!("00000000-0000-0000-0000-00000000002a"));
        assert_eq!(wire["messageType"], json!("policy_created"));
        assert_eq!(wire["operation"], json!("INSERT"));
        assert_eq!(wire["script"], json!(null));
        assert_eq!(wire["fieldMapping"], json!([{"target": "a", "expr": "1"}]));
    }

    #[test]
    fn operation_round_trips_through_wire_names() {
        for (op, name) in [
            (Operation::Insert, "INSERT"),
            (Operation::Update, "UPDATE"),
            (Operation::Delete, "DELETE"),
        ] {
            let wire = serde_json::to_value(op).unwrap();
            assert_eq!(wire, json!(name));
            let parsed: Operation = serde_json::from_value(wire).unwrap();
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn record_reconstructs_the_hook() {
        let hook = sample_hook();
        let record = ControlRecord::from_hook(&hook, Operation::Update);
        let rebuilt = record.to_hook().unwrap();
        assert_eq!(rebuilt.hook_id, hook.hook_id);
        assert_eq!(rebuilt.body, hook.body);
    }

    #[test]
    fn bodiless_record_reconstructs_nothing() {
        let mut record = ControlRecord::from_hook(&sample_hook(), Operation::Delete);
        record.field_mapping = None;
        assert!(record.to_hook().is_none());
    }
}
