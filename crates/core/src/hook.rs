//! Transformation-rule ("hook") domain types, validation, and selection.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::expr::Script;
use crate::mapping::FieldMapping;
use crate::types::Timestamp;

/// Maximum length of a hook name.
pub const MAX_HOOK_NAME_LENGTH: usize = 200;

// ---------------------------------------------------------------------------
// HookBody
// ---------------------------------------------------------------------------

/// The executable body of a hook: either a free-form rule script or a
/// declarative field mapping. Exactly one applies to any given hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookBody {
    /// A sandbox expression script; its result becomes the output document.
    Script(String),
    /// An ordered list of `target = expression` assignments.
    Mapping(FieldMapping),
}

impl HookBody {
    /// Construct a body from the nullable script / field-mapping pair used
    /// by storage and the wire, enforcing that exactly one is present.
    ///
    /// The mapping source is parsed (and thereby compiled) here, so every
    /// syntax error rejects the mutation before anything is persisted.
    pub fn from_parts(
        script: Option<&str>,
        field_mapping: Option<&str>,
    ) -> Result<Self, CoreError> {
        match (script, field_mapping) {
            (Some(script), None) => {
                Script::compile(script)
                    .map_err(|e| CoreError::Validation(format!("invalid script: {e}")))?;
                Ok(Self::Script(script.to_string()))
            }
            (None, Some(mapping)) => {
                let parsed = FieldMapping::parse(mapping)
                    .map_err(|e| CoreError::Validation(format!("invalid field mapping: {e}")))?;
                Ok(Self::Mapping(parsed))
            }
            (Some(_), Some(_)) => Err(CoreError::Validation(
                "a hook must define either a script or a field mapping, not both".to_string(),
            )),
            (None, None) => Err(CoreError::Validation(
                "a hook must define a script or a field mapping".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Hook
// ---------------------------------------------------------------------------

/// A named, prioritized transformation rule bound to a
/// (message type, source system) key.
///
/// `source_system = None` is a wildcard: the hook is a candidate for any
/// source producing the message type. Lower `priority` wins; ties break by
/// ascending `hook_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub hook_id: Uuid,
    pub hook_name: String,
    pub message_type: String,
    pub source_system: Option<String>,
    pub body: HookBody,
    pub enabled: bool,
    pub priority: i32,
    pub updated_at: Timestamp,
}

impl Hook {
    /// Whether this hook is a live candidate for a message from
    /// `source_system`.
    pub fn matches_source(&self, source_system: &str) -> bool {
        self.enabled
            && self
                .source_system
                .as_deref()
                .map(|s| s == source_system)
                .unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a hook name: non-empty, within length limit.
pub fn validate_hook_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Hook name must not be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_HOOK_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Hook name exceeds maximum length of {MAX_HOOK_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a message type: non-empty.
pub fn validate_message_type(message_type: &str) -> Result<(), CoreError> {
    if message_type.trim().is_empty() {
        return Err(CoreError::Validation(
            "Message type must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Select the winning hook among candidates for one message key: the
/// enabled hook with the lowest priority value, ties broken by ascending
/// `hook_id` so repeated calls are deterministic.
pub fn select_best<'a, I>(candidates: I) -> Option<&'a Hook>
where
    I: IntoIterator<Item = &'a Hook>,
{
    candidates
        .into_iter()
        .filter(|h| h.enabled)
        .min_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.hook_id.cmp(&b.hook_id))
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn make_hook(id: u128, priority: i32, enabled: bool) -> Hook {
        Hook {
            hook_id: Uuid::from_u128(id),
            hook_name: format!("hook-{id}"),
            message_type: "policy_created".to_string(),
            source_system: Some("legacy_crm".to_string()),
            body: HookBody::Script("message".to_string()),
            enabled,
            priority,
            updated_at: Utc::now(),
        }
    }

    // -- Body construction --------------------------------------------------

    #[test]
    fn body_from_script() {
        let body = HookBody::from_parts(Some("1 + 1"), None).unwrap();
        assert_matches!(body, HookBody::Script(_));
    }

    #[test]
    fn body_from_mapping() {
        let body = HookBody::from_parts(None, Some("a = 1;")).unwrap();
        assert_matches!(body, HookBody::Mapping(_));
    }

    #[test]
    fn body_rejects_bad_script_syntax() {
        let err = HookBody::from_parts(Some("1 +"), None).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn body_rejects_bad_mapping_syntax() {
        assert!(HookBody::from_parts(None, Some("no assignment here")).is_err());
    }

    #[test]
    fn body_rejects_both_and_neither() {
        assert!(HookBody::from_parts(Some("1"), Some("a = 1;")).is_err());
        assert!(HookBody::from_parts(None, None).is_err());
    }

    // -- Selection ----------------------------------------------------------

    #[test]
    fn lowest_priority_value_wins() {
        let hooks = vec![
            make_hook(1, 10, true),
            make_hook(2, 5, true),
            make_hook(3, 20, true),
        ];
        let best = select_best(&hooks).unwrap();
        assert_eq!(best.priority, 5);
    }

    #[test]
    fn disabled_hooks_are_skipped() {
        let hooks = vec![make_hook(1, 1, false), make_hook(2, 9, true)];
        assert_eq!(select_best(&hooks).unwrap().priority, 9);
    }

    #[test]
    fn tie_breaks_by_ascending_hook_id() {
        let hooks = vec![make_hook(7, 5, true), make_hook(3, 5, true)];
        for _ in 0..10 {
            let best = select_best(&hooks).unwrap();
            assert_eq!(best.hook_id, Uuid::from_u128(3));
        }
    }

    #[test]
    fn no_enabled_candidates_selects_nothing() {
        let hooks = vec![make_hook(1, 1, false)];
        assert!(select_best(&hooks).is_none());
    }

    // -- Source matching ----------------------------------------------------

    #[test]
    fn exact_source_match() {
        let hook = make_hook(1, 1, true);
        assert!(hook.matches_source("legacy_crm"));
        assert!(!hook.matches_source("other"));
    }

    #[test]
    fn null_source_is_a_wildcard() {
        let mut hook = make_hook(1, 1, true);
        hook.source_system = None;
        assert!(hook.matches_source("anything"));
    }

    #[test]
    fn disabled_hook_never_matches() {
        let hook = make_hook(1, 1, false);
        assert!(!hook.matches_source("legacy_crm"));
    }

    // -- Name validation ----------------------------------------------------

    #[test]
    fn hook_name_rules() {
        assert!(validate_hook_name("normalize-policy").is_ok());
        assert!(validate_hook_name("").is_err());
        assert!(validate_hook_name("   ").is_err());
        assert!(validate_hook_name(&"a".repeat(MAX_HOOK_NAME_LENGTH + 1)).is_err());
    }
}
