//! Declarative field mappings: `target = expression;` statements.
//!
//! A field mapping is an ordered list of independent assignments. Each
//! expression is evaluated against the original message context only —
//! later entries never see earlier outputs. Evaluation is all-or-nothing:
//! the first failure discards every partial result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expr::{Context, Script, ScriptEvaluationError, ScriptSyntaxError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A mapping failed to parse. Raised at hook-save time, before any
/// evaluation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MappingParseError {
    /// A statement had no `=` separating target from expression.
    #[error("mapping statement `{statement}` is missing `=`")]
    MissingAssignment { statement: String },

    /// The target field name was empty or not a plain identifier.
    #[error("invalid target field `{target}` in `{statement}`")]
    InvalidTarget { target: String, statement: String },

    /// The right-hand expression failed to compile.
    #[error("expression for `{target}` is invalid: {source}")]
    Expression {
        target: String,
        #[source]
        source: ScriptSyntaxError,
    },

    /// The mapping contained no statements.
    #[error("mapping contains no statements")]
    Empty,
}

/// A single mapping entry failed to evaluate; the whole mapping is aborted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("mapping of `{target_field}` failed: {source}")]
pub struct MappingEvaluationError {
    /// The target field whose expression failed.
    pub target_field: String,
    /// The expression source text.
    pub expression: String,
    #[source]
    pub source: ScriptEvaluationError,
}

// ---------------------------------------------------------------------------
// FieldMapping
// ---------------------------------------------------------------------------

/// One `target = expression` pair, in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Output document key.
    pub target: String,
    /// Expression source text.
    #[serde(rename = "expr")]
    pub expression: String,
}

/// An ordered, validated field mapping.
///
/// Parsing compiles every expression so syntax errors surface at save time;
/// the entries themselves stay in source form for the wire and for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    pub entries: Vec<MappingEntry>,
}

impl FieldMapping {
    /// Parse a semicolon-delimited mapping source.
    ///
    /// Splitting is quote-aware so `;` inside string literals does not end a
    /// statement. Every expression is compiled during parsing; a compile
    /// failure rejects the whole mapping.
    pub fn parse(source: &str) -> Result<Self, MappingParseError> {
        let mut entries = Vec::new();

        for statement in split_statements(source) {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(eq_pos) = find_assignment(trimmed) else {
                return Err(MappingParseError::MissingAssignment {
                    statement: trimmed.to_string(),
                });
            };
            let target = trimmed[..eq_pos].trim().to_string();
            let expression = trimmed[eq_pos + 1..].trim().to_string();

            if target.is_empty() || !is_identifier(&target) {
                return Err(MappingParseError::InvalidTarget {
                    target,
                    statement: trimmed.to_string(),
                });
            }

            Script::compile(&expression).map_err(|source| MappingParseError::Expression {
                target: target.clone(),
                source,
            })?;

            entries.push(MappingEntry { target, expression });
        }

        if entries.is_empty() {
            return Err(MappingParseError::Empty);
        }
        Ok(Self { entries })
    }

    /// Validate already-parsed entries (e.g. received over the wire).
    pub fn validate(&self) -> Result<(), MappingParseError> {
        if self.entries.is_empty() {
            return Err(MappingParseError::Empty);
        }
        for entry in &self.entries {
            if !is_identifier(&entry.target) {
                return Err(MappingParseError::InvalidTarget {
                    target: entry.target.clone(),
                    statement: format!("{} = {}", entry.target, entry.expression),
                });
            }
            Script::compile(&entry.expression).map_err(|source| {
                MappingParseError::Expression {
                    target: entry.target.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Compile all entries for repeated evaluation.
    pub fn compile(&self) -> Result<CompiledMapping, MappingParseError> {
        let mut compiled = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let script = Script::compile(&entry.expression).map_err(|source| {
                MappingParseError::Expression {
                    target: entry.target.clone(),
                    source,
                }
            })?;
            compiled.push((entry.target.clone(), script));
        }
        Ok(CompiledMapping { entries: compiled })
    }
}

/// A field mapping with every expression compiled.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    entries: Vec<(String, Script)>,
}

impl CompiledMapping {
    /// Evaluate the mapping against a message payload.
    ///
    /// Builds one flattened context, then evaluates each entry in declared
    /// order. The first failure aborts with partial results discarded.
    pub fn evaluate(&self, payload: &Value) -> Result<Map<String, Value>, MappingEvaluationError> {
        let ctx = flattened_context(payload);
        let mut output = Map::with_capacity(self.entries.len());

        for (target, script) in &self.entries {
            let value = script.eval(&ctx).map_err(|source| MappingEvaluationError {
                target_field: target.clone(),
                expression: script.source().to_string(),
                source,
            })?;
            output.insert(target.clone(), value);
        }
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Context flattening
// ---------------------------------------------------------------------------

/// Build the mapping evaluation context: the original top-level fields plus
/// underscore-joined flattened keys for every nested object, so expressions
/// may use `address.city` or `address_city` interchangeably.
pub fn flattened_context(payload: &Value) -> Context {
    let mut vars = match payload {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    if let Value::Object(map) = payload {
        for (key, value) in map {
            flatten_into(key, value, &mut vars);
        }
    }

    Context::from_vars(vars, payload.clone())
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    if let Value::Object(map) = value {
        for (key, child) in map {
            let flat_key = format!("{prefix}_{key}");
            // Original top-level fields win on collision.
            out.entry(flat_key.clone()).or_insert_with(|| child.clone());
            flatten_into(&flat_key, child, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Statement splitting
// ---------------------------------------------------------------------------

/// Split on `;` outside of string literals.
fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in source.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                ';' => {
                    statements.push(std::mem::take(&mut current));
                }
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                _ => current.push(ch),
            },
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    statements
}

/// Find the `=` that separates target from expression, skipping `==`, `!=`,
/// `<=`, `>=` and anything inside string literals.
fn find_assignment(statement: &str) -> Option<usize> {
    let bytes = statement.as_bytes();
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' => {
                quote = Some(b);
                i += 1;
            }
            b'=' => {
                let next_is_eq = bytes.get(i + 1) == Some(&b'=');
                let prev_is_op = i > 0 && matches!(bytes[i - 1], b'=' | b'!' | b'<' | b'>');
                if next_is_eq || prev_is_op {
                    i += if next_is_eq { 2 } else { 1 };
                } else {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
