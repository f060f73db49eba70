//! Worker-local cache of compiled hook bodies.
//!
//! Hook bodies arrive over the control channel in source form and are
//! compiled on first use. The cache key includes `updated_at`, so an
//! updated hook recompiles exactly once and the stale entry is dropped;
//! each worker owns its cache, no locking is involved.

use std::collections::HashMap;

use uuid::Uuid;

use intake_core::expr::Script;
use intake_core::hook::{Hook, HookBody};
use intake_core::mapping::CompiledMapping;
use intake_core::types::Timestamp;

/// A hook body ready for evaluation.
#[derive(Debug, Clone)]
pub enum CompiledBody {
    Script(Script),
    Mapping(CompiledMapping),
}

impl CompiledBody {
    /// Compile a body for one-shot or cached evaluation.
    pub fn compile(body: &HookBody) -> Result<Self, String> {
        match body {
            HookBody::Script(source) => Script::compile(source)
                .map(Self::Script)
                .map_err(|e| e.to_string()),
            HookBody::Mapping(mapping) => mapping
                .compile()
                .map(Self::Mapping)
                .map_err(|e| e.to_string()),
        }
    }
}

/// Bound on distinct hooks held per cache. An updated hook replaces its
/// entry in place, but entries for deleted hooks linger; once the bound is
/// hit the cache resets and repopulates from live traffic, so memory stays
/// bounded under hook churn.
const MAX_ENTRIES: usize = 1024;

#[derive(Debug)]
pub struct ScriptCache {
    entries: HashMap<Uuid, (Timestamp, CompiledBody)>,
    max_entries: usize,
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::bounded(MAX_ENTRIES)
    }
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache holding at most `max_entries` distinct hooks.
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    /// The compiled body for a hook, compiling it if this version has not
    /// been seen before.
    ///
    /// Bodies are validated at save time, so a compile failure here means a
    /// corrupt control record; it is reported rather than cached.
    pub fn get_or_compile(&mut self, hook: &Hook) -> Result<&CompiledBody, String> {
        let fresh = matches!(
            self.entries.get(&hook.hook_id),
            Some((cached_at, _)) if *cached_at == hook.updated_at
        );
        if !fresh {
            let compiled = CompiledBody::compile(&hook.body)?;
            if self.entries.len() >= self.max_entries
                && !self.entries.contains_key(&hook.hook_id)
            {
                self.entries.clear();
            }
            self.entries
                .insert(hook.hook_id, (hook.updated_at, compiled));
        }
        Ok(&self.entries[&hook.hook_id].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
