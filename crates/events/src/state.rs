//! Per-worker replica of the live hook set.
//!
//! Each pipeline worker owns one [`BroadcastState`] instance, populated
//! exclusively by its control-consuming task. Workers never share an
//! instance; consistency across workers is eventual. The state is not
//! persisted — it is reconstructible at any time by replaying control
//! records (the registry's republish-all).

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use intake_core::control::{ControlRecord, Operation};
use intake_core::hook::{self, Hook};

/// A worker-local map from message type to the known hooks for that type.
///
/// The apply rule makes replay safe: DELETE always removes, everything
/// else upserts with last-write-wins on `updated_at`. Duplicate or
/// out-of-order records therefore never regress state.
///
/// All hooks per type are retained (not just the current winner) so that
/// deleting or disabling the winner immediately falls back to the
/// runner-up without a resync.
#[derive(Debug, Default)]
pub struct BroadcastState {
    inner: RwLock<HashMap<String, HashMap<Uuid, Hook>>>,
}

impl BroadcastState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one control record.
    pub fn apply(&self, record: &ControlRecord) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        match record.operation {
            Operation::Delete => {
                if let Some(hooks) = inner.get_mut(&record.message_type) {
                    hooks.remove(&record.hook_id);
                    if hooks.is_empty() {
                        inner.remove(&record.message_type);
                    }
                }
            }
            Operation::Insert | Operation::Update => {
                let Some(hook) = record.to_hook() else {
                    tracing::warn!(
                        hook_id = %record.hook_id,
                        operation = %record.operation,
                        "Control record carries no body, ignoring"
                    );
                    return;
                };
                let hooks = inner.entry(record.message_type.clone()).or_default();
                match hooks.get(&record.hook_id) {
                    // Last-write-wins: ignore records older than what we hold.
                    Some(existing) if existing.updated_at > record.updated_at => {
                        tracing::debug!(
                            hook_id = %record.hook_id,
                            "Ignoring stale control record"
                        );
                    }
                    _ => {
                        hooks.insert(record.hook_id, hook);
                    }
                }
            }
        }
    }

    /// The winning hook for a message key, if any: enabled, matching the
    /// source system (or wildcard), lowest priority, ties broken by
    /// ascending hook id.
    pub fn lookup(&self, message_type: &str, source_system: &str) -> Option<Hook> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let hooks = inner.get(message_type)?;
        hook::select_best(
            hooks
                .values()
                .filter(|h| h.matches_source(source_system)),
        )
        .cloned()
    }

    /// Total number of hooks held across all message types.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use intake_core::hook::HookBody;
    use intake_core::types::Timestamp;

    fn record(
        id: u128,
        priority: i32,
        enabled: bool,
        updated_at: Timestamp,
        operation: Operation,
    ) -> ControlRecord {
        let hook = Hook {
            hook_id: Uuid::from_u128(id),
            hook_name: format!("hook-{id}"),
            message_type: "policy_created".to_string(),
            source_system: None,
            body: HookBody::Script(format!("'v{id}'")),
            enabled,
            priority,
            updated_at,
        };
        ControlRecord::from_hook(&hook, operation)
    }

    #[test]
    fn insert_then_lookup() {
        let state = BroadcastState::new();
        state.apply(&record(1, 10, true, Utc::now(), Operation::Insert));
        let hook = state.lookup("policy_created", "any").unwrap();
        assert_eq!(hook.hook_id, Uuid::from_u128(1));
    }

    #[test]
    fn lookup_unknown_type_is_none() {
        let state = BroadcastState::new();
        assert!(state.lookup("unknown_type", "unknown_system").is_none());
    }

    #[test]
    fn lowest_priority_wins_among_candidates() {
        let state = BroadcastState::new();
        let now = Utc::now();
        state.apply(&record(1, 10, true, now, Operation::Insert));
        state.apply(&record(2, 5, true, now, Operation::Insert));
        state.apply(&record(3, 20, true, now, Operation::Insert));
        assert_eq!(
            state.lookup("policy_created", "x").unwrap().hook_id,
            Uuid::from_u128(2)
        );
    }

    #[test]
    fn exact_source_beats_nothing_but_wildcard_matches() {
        let state = BroadcastState::new();
        let now = Utc::now();
        let mut rec = record(1, 10, true, now, Operation::Insert);
        rec.source_system = Some("crm".to_string());
        state.apply(&rec);

        // Wrong source: only the wildcard (none here) could match.
        assert!(state.lookup("policy_created", "erp").is_none());
        assert!(state.lookup("policy_created", "crm").is_some());
    }

    #[test]
    fn deleting_the_winner_falls_back_to_runner_up() {
        let state = BroadcastState::new();
        let now = Utc::now();
        state.apply(&record(1, 5, true, now, Operation::Insert));
        state.apply(&record(2, 10, true, now, Operation::Insert));

        state.apply(&record(1, 5, true, now, Operation::Delete));
        assert_eq!(
            state.lookup("policy_created", "x").unwrap().hook_id,
            Uuid::from_u128(2)
        );
    }

    #[test]
    fn duplicate_delete_is_idempotent() {
        let state = BroadcastState::new();
        let now = Utc::now();
        state.apply(&record(1, 5, true, now, Operation::Insert));

        let delete = record(1, 5, true, now, Operation::Delete);
        state.apply(&delete);
        let after_once = state.len();
        state.apply(&delete);
        assert_eq!(state.len(), after_once);
        assert!(state.lookup("policy_created", "x").is_none());
    }

    #[test]
    fn stale_update_does_not_regress_newer_state() {
        let state = BroadcastState::new();
        let now = Utc::now();

        let newer = record(1, 5, true, now, Operation::Update);
        let older = record(1, 99, false, now - Duration::seconds(60), Operation::Update);

        state.apply(&newer);
        state.apply(&older);

        let hook = state.lookup("policy_created", "x").unwrap();
        assert_eq!(hook.priority, 5);
        assert!(hook.enabled);
    }

    #[test]
    fn replaying_the_same_update_is_idempotent() {
        let state = BroadcastState::new();
        let rec = record(1, 5, true, Utc::now(), Operation::Update);
        state.apply(&rec);
        state.apply(&rec);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn worker_states_converge_once_both_consume_an_update() {
        let a = BroadcastState::new();
        let b = BroadcastState::new();
        let now = Utc::now();

        let insert = record(1, 5, true, now, Operation::Insert);
        a.apply(&insert);
        b.apply(&insert);

        // Only one worker has consumed the update so far; the other serves
        // the previous version, which is the allowed transient divergence.
        let update = record(1, 50, true, now + Duration::seconds(1), Operation::Update);
        a.apply(&update);
        assert_eq!(a.lookup("policy_created", "x").unwrap().priority, 50);
        assert_eq!(b.lookup("policy_created", "x").unwrap().priority, 5);

        b.apply(&update);
        assert_eq!(b.lookup("policy_created", "x").unwrap().priority, 50);
    }

    #[test]
    fn disabled_update_hides_the_hook_from_lookup() {
        let state = BroadcastState::new();
        let now = Utc::now();
        state.apply(&record(1, 5, true, now, Operation::Insert));
        state.apply(&record(1, 5, false, now + Duration::seconds(1), Operation::Update));
        assert!(state.lookup("policy_created", "x").is_none());
    }
}
