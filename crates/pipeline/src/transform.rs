//! The per-message transform stage.
//!
//! Pure message-in / outcome-out: hook selection against the worker's
//! broadcast state, body execution, and result shaping. The worker loop
//! owns channel plumbing; this stage never touches a channel, which keeps
//! the failure-isolation contract testable without any runtime.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use intake_core::expr::Context;
use intake_core::message::{FailedMessage, RawMessage, TransformedMessage};
use intake_events::BroadcastState;

use crate::cache::{CompiledBody, ScriptCache};

/// What became of one raw message.
#[derive(Debug)]
pub enum TransformOutcome {
    /// A hook matched and executed cleanly.
    Success(TransformedMessage),
    /// A hook matched but execution failed; routed to the dead-letter
    /// channel, the pipeline moves on.
    Failed(FailedMessage),
    /// No enabled hook matched the message key; the message is dropped.
    NoMatch,
}

pub struct TransformStage {
    state: Arc<BroadcastState>,
    cache: ScriptCache,
}

impl TransformStage {
    pub fn new(state: Arc<BroadcastState>) -> Self {
        Self {
            state,
            cache: ScriptCache::new(),
        }
    }

    /// Transform one message.
    ///
    /// Never panics and never returns an error: every fault is folded into
    /// [`TransformOutcome::Failed`] so the caller's loop stays alive.
    pub fn transform(&mut self, message: &RawMessage) -> TransformOutcome {
        let Some(hook) = self
            .state
            .lookup(&message.message_type, &message.source_system)
        else {
            tracing::debug!(
                message_id = %message.message_id,
                message_type = %message.message_type,
                source_system = %message.source_system,
                "No hook matched, dropping message"
            );
            return TransformOutcome::NoMatch;
        };

        let started = Instant::now();
        let result = self
            .cache
            .get_or_compile(&hook)
            .map_err(|e| format!("hook body failed to compile: {e}"))
            .and_then(|body| execute(body, &message.payload));
        let execution_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(result_data) => {
                tracing::debug!(
                    message_id = %message.message_id,
                    hook_name = %hook.hook_name,
                    execution_time_ms,
                    "Message transformed"
                );
                TransformOutcome::Success(TransformedMessage {
                    message_id: message.message_id,
                    hook_name: hook.hook_name,
                    result_data,
                })
            }
            Err(error_message) => {
                tracing::warn!(
                    message_id = %message.message_id,
                    hook_name = %hook.hook_name,
                    error = %error_message,
                    execution_time_ms,
                    "Message transformation failed"
                );
                TransformOutcome::Failed(FailedMessage {
                    message_id: message.message_id,
                    hook_name: Some(hook.hook_name),
                    error_message,
                    execution_time_ms,
                })
            }
        }
    }
}

/// Execute a compiled body against a payload.
///
/// Script results that are not objects are wrapped under a `result` key so
/// the success channel always carries a document.
pub fn execute(body: &CompiledBody, payload: &Value) -> Result<Value, String> {
    match body {
        CompiledBody::Script(script) => {
            let ctx = Context::from_payload(payload);
            let value = script.eval(&ctx).map_err(|e| e.to_string())?;
            Ok(match value {
                Value::Object(_) => value,
                other => json!({ "result": other }),
            })
        }
        CompiledBody::Mapping(mapping) => {
            let output = mapping.evaluate(payload).map_err(|e| e.to_string())?;
            Ok(Value::Object(output))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use uuid::Uuid;

    use intake_core::control::{ControlRecord, Operation};
    use intake_core::hook::{Hook, HookBody};
    use intake_core::mapping::FieldMapping;

    fn state_with(hooks: Vec<Hook>) -> Arc<BroadcastState> {
        let state = Arc::new(BroadcastState::new());
        for hook in &hooks {
            state.apply(&ControlRecord::from_hook(hook, Operation::Insert));
        }
        state
    }

    fn script_hook(id: u128, priority: i32, source: &str) -> Hook {
        Hook {
            hook_id: Uuid::from_u128(id),
            hook_name: format!("hook-{id}"),
            message_type: "policy_created".to_string(),
            source_system: None,
            body: HookBody::Script(source.to_string()),
            enabled: true,
            priority,
            updated_at: Utc::now(),
        }
    }

    fn message(payload: Value) -> RawMessage {
        RawMessage {
            message_id: Uuid::from_u128(99),
            message_type: "policy_created".to_string(),
            source_system: "legacy_crm".to_string(),
            payload,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn script_object_result_becomes_the_output_document() {
        let state = state_with(vec![script_hook(1, 0, "{ total: amount * 2 }")]);
        let mut stage = TransformStage::new(state);

        let outcome = stage.transform(&message(json!({"amount": 21})));
        let TransformOutcome::Success(out) = outcome else {
            panic!("expected success");
        };
        assert_eq!(out.result_data, json!({"total": 42.0}));
        assert_eq!(out.hook_name, "hook-1");
        assert_eq!(out.message_id, Uuid::from_u128(99));
    }

    #[test]
    fn script_scalar_result_is_wrapped() {
        let state = state_with(vec![script_hook(1, 0, "amount * 2")]);
        let mut stage = TransformStage::new(state);

        let outcome = stage.transform(&message(json!({"amount": 21})));
        assert_matches!(
            outcome,
            TransformOutcome::Success(out) if out.result_data == json!({"result": 42.0})
        );
    }

    #[test]
    fn mapping_result_is_the_mapped_document() {
        let mut hook = script_hook(1, 0, "");
        hook.body = HookBody::Mapping(
            FieldMapping::parse("policy_number = ref.toUpperCase(); holder = name;").unwrap(),
        );
        let state = state_with(vec![hook]);
        let mut stage = TransformStage::new(state);

        let outcome = stage.transform(&message(json!({"ref": "pol-1", "name": "Ada"})));
        assert_matches!(
            outcome,
            TransformOutcome::Success(out)
                if out.result_data == json!({"policy_number": "POL-1", "holder": "Ada"})
        );
    }

    #[test]
    fn unmatched_message_is_dropped() {
        let stage_state = state_with(vec![]);
        let mut stage = TransformStage::new(stage_state);
        assert_matches!(
            stage.transform(&message(json!({}))),
            TransformOutcome::NoMatch
        );
    }

    #[test]
    fn evaluation_fault_goes_to_dead_letter_with_the_hook_name() {
        let state = state_with(vec![script_hook(1, 0, "amount / 0")]);
        let mut stage = TransformStage::new(state);

        let outcome = stage.transform(&message(json!({"amount": 1})));
        let TransformOutcome::Failed(failed) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failed.hook_name.as_deref(), Some("hook-1"));
        assert!(failed.error_message.contains("division by zero"));
    }

    #[test]
    fn failure_does_not_poison_subsequent_messages() {
        let state = state_with(vec![script_hook(1, 0, "amount / divisor")]);
        let mut stage = TransformStage::new(state);

        assert_matches!(
            stage.transform(&message(json!({"amount": 1, "divisor": 0}))),
            TransformOutcome::Failed(_)
        );
        assert_matches!(
            stage.transform(&message(json!({"amount": 8, "divisor": 2}))),
            TransformOutcome::Success(_)
        );
    }

    #[test]
    fn lowest_priority_hook_is_applied() {
        let state = state_with(vec![
            script_hook(1, 10, "{ via: 'ten' }"),
            script_hook(2, 1, "{ via: 'one' }"),
        ]);
        let mut stage = TransformStage::new(state);

        let outcome = stage.transform(&message(json!({})));
        assert_matches!(
            outcome,
            TransformOutcome::Success(out) if out.result_data == json!({"via": "one"})
        );
    }

    #[test]
    fn hook_update_applies_to_later_messages() {
        let mut hook = script_hook(1, 0, "{ version: 1 }");
        let state = state_with(vec![hook.clone()]);
        let mut stage = TransformStage::new(Arc::clone(&state));

        assert_matches!(
            stage.transform(&message(json!({}))),
            TransformOutcome::Success(out) if out.result_data == json!({"version": 1.0})
        );

        hook.body = HookBody::Script("{ version: 2 }".to_string());
        hook.updated_at = hook.updated_at + chrono::Duration::seconds(1);
        state.apply(&ControlRecord::from_hook(&hook, Operation::Update));

        assert_matches!(
            stage.transform(&message(json!({}))),
            TransformOutcome::Success(out) if out.result_data == json!({"version": 2.0})
        );
    }
}
