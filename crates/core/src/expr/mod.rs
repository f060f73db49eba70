//! Sandboxed expression language for transformation rules.
//!
//! Rule scripts are compiled once ([`Script::compile`]) and evaluated many
//! times against per-message contexts ([`Script::eval`]). The language is a
//! small, pure expression language: arithmetic, string operations, ternary,
//! object/array literals, null-safe property navigation, a short method
//! allowlist, and a read-only `math` namespace. There is no I/O, no host
//! reflection, no assignment, and no loops; every evaluation runs under a
//! fixed operation budget.
//!
//! Null handling is deliberately lenient: undefined names and missing
//! properties evaluate to null, arithmetic and ordering against null
//! propagate null, and boolean positions (ternary condition, `&&`, `||`,
//! `!`) treat null as false. String concatenation renders null as `"null"`.

mod eval;
mod lexer;
mod parser;

use serde_json::{Map, Value};

use self::parser::Expr;

/// Upper bound on evaluator operations for a single [`Script::eval`] call.
///
/// The language has no loops, so the node count bounds the work per
/// evaluation; the budget guards against pathologically large rule bodies
/// stalling a worker.
pub const MAX_EVAL_OPS: u32 = 100_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A compile-time syntax error.
///
/// Raised at hook-save time so a rule that parses never fails to compile at
/// evaluation time.
#[derive(Debug, Clone, thiserror::Error)]
#[error("syntax error at offset {offset}: {message}")]
pub struct ScriptSyntaxError {
    /// Byte offset into the source where the error was detected.
    pub offset: usize,
    /// Human-readable description of the problem.
    pub message: String,
}

/// A runtime evaluation fault (type mismatch, division by zero, exceeded
/// operation budget).
///
/// Callers convert this into a per-message failure; it must never abort the
/// surrounding pipeline.
#[derive(Debug, Clone, thiserror::Error)]
#[error("evaluation of `{expression}` failed: {cause}")]
pub struct ScriptEvaluationError {
    /// The source text of the script that failed.
    pub expression: String,
    /// Description of the fault.
    pub cause: String,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-message evaluation context.
///
/// The raw message document forms the root scope: each top-level field is
/// directly addressable by name. The whole document is additionally exposed
/// under the `message` alias. `math` is reserved for the built-in namespace.
#[derive(Debug, Clone)]
pub struct Context {
    vars: Map<String, Value>,
    root: Value,
}

impl Context {
    /// Build a context from a raw message payload.
    ///
    /// Non-object payloads are only reachable through the `message` alias.
    pub fn from_payload(payload: &Value) -> Self {
        let vars = match payload {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        Self {
            vars,
            root: payload.clone(),
        }
    }

    /// Build a context from an explicit variable map.
    ///
    /// Used by the field-mapping evaluator, which enriches the root scope
    /// with underscore-flattened keys. `root` stays the original payload so
    /// the `message` alias is unaffected by flattening.
    pub fn from_vars(vars: Map<String, Value>, root: Value) -> Self {
        Self { vars, root }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    fn root(&self) -> &Value {
        &self.root
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// A compiled rule script.
///
/// A script is one or more `;`-separated expressions; the value of the last
/// expression is the script result.
#[derive(Debug, Clone)]
pub struct Script {
    exprs: Vec<Expr>,
    source: String,
}

impl Script {
    /// Compile source text into an evaluable script.
    pub fn compile(source: &str) -> Result<Self, ScriptSyntaxError> {
        let tokens = lexer::tokenize(source)?;
        let exprs = parser::parse(&tokens, source.len())?;
        Ok(Self {
            exprs,
            source: source.to_string(),
        })
    }

    /// Evaluate the script against a message context.
    ///
    /// Synchronous and side-effect free; faults are reported as
    /// [`ScriptEvaluationError`], never panics.
    pub fn eval(&self, ctx: &Context) -> Result<Value, ScriptEvaluationError> {
        let mut evaluator = eval::Evaluator::new(ctx, MAX_EVAL_OPS);
        let mut last = Value::Null;
        for expr in &self.exprs {
            last = evaluator.eval(expr).map_err(|e| ScriptEvaluationError {
                expression: self.source.clone(),
                cause: e.0,
            })?;
        }
        Ok(last)
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_str(src: &str, payload: Value) -> Value {
        let script = Script::compile(src).expect("script should compile");
        let ctx = Context::from_payload(&payload);
        script.eval(&ctx).expect("script should evaluate")
    }

    fn eval_err(src: &str, payload: Value) -> ScriptEvaluationError {
        let script = Script::compile(src).expect("script should compile");
        let ctx = Context::from_payload(&payload);
        script.eval(&ctx).expect_err("script should fail")
    }

    // -- Literals and arithmetic -------------------------------------------

    #[test]
    fn number_arithmetic() {
        assert_eq!(eval_str("1 + 2 * 3", json!({})), json!(7.0));
        assert_eq!(eval_str("(1 + 2) * 3", json!({})), json!(9.0));
        assert_eq!(eval_str("10 % 3", json!({})), json!(1.0));
        assert_eq!(eval_str("-4 + 1", json!({})), json!(-3.0));
    }

    #[test]
    fn division_by_zero_is_an_evaluation_error() {
        let err = eval_err("1 / 0", json!({}));
        assert!(err.cause.contains("division by zero"), "{}", err.cause);
    }

    #[test]
    fn string_literals_single_and_double_quoted() {
        assert_eq!(eval_str("'hi'", json!({})), json!("hi"));
        assert_eq!(eval_str("\"hi\"", json!({})), json!("hi"));
    }

    #[test]
    fn object_and_array_literals() {
        let out = eval_str("{a: 1, 'b': 'x', c: [1, 2]}", json!({}));
        assert_eq!(out, json!({"a": 1.0, "b": "x", "c": [1.0, 2.0]}));
    }

    // -- Property navigation ------------------------------------------------

    #[test]
    fn dot_navigation_reads_nested_fields() {
        let payload = json!({"customer": {"firstName": "Jane"}});
        assert_eq!(eval_str("customer.firstName", payload), json!("Jane"));
    }

    #[test]
    fn missing_property_evaluates_to_null() {
        let payload = json!({"customer": {"firstName": "Jane"}});
        assert_eq!(eval_str("customer.lastName", payload), Value::Null);
    }

    #[test]
    fn undefined_variable_evaluates_to_null() {
        assert_eq!(eval_str("nothing", json!({})), Value::Null);
        assert_eq!(eval_str("nothing.at.all", json!({})), Value::Null);
    }

    #[test]
    fn message_alias_equals_root() {
        let payload = json!({"a": 1});
        assert_eq!(eval_str("message.a", payload.clone()), json!(1));
        assert_eq!(eval_str("message", payload.clone()), payload);
    }

    #[test]
    fn index_into_arrays_and_objects() {
        let payload = json!({"xs": [10, 20], "m": {"k": "v"}});
        assert_eq!(eval_str("xs[1]", payload.clone()), json!(20));
        assert_eq!(eval_str("m['k']", payload.clone()), json!("v"));
        assert_eq!(eval_str("xs[9]", payload), Value::Null);
    }

    // -- Null leniency ------------------------------------------------------

    #[test]
    fn concatenation_renders_null() {
        let payload = json!({"customer": {"firstName": "Jane"}});
        let out = eval_str(
            "customer.firstName + ' ' + customer.lastName",
            payload,
        );
        assert_eq!(out, json!("Jane null"));
    }

    #[test]
    fn arithmetic_with_null_propagates_null() {
        assert_eq!(eval_str("missing + 1", json!({})), Value::Null);
        assert_eq!(eval_str("missing * 2", json!({})), Value::Null);
    }

    #[test]
    fn ordering_with_null_propagates_null() {
        assert_eq!(eval_str("missing < 1", json!({})), Value::Null);
    }

    #[test]
    fn null_is_false_in_boolean_positions() {
        assert_eq!(eval_str("missing ? 'y' : 'n'", json!({})), json!("n"));
        assert_eq!(eval_str("missing && true", json!({})), json!(false));
        assert_eq!(eval_str("missing || true", json!({})), json!(true));
        assert_eq!(eval_str("!missing", json!({})), json!(true));
    }

    #[test]
    fn equality_with_null() {
        assert_eq!(eval_str("missing == null", json!({})), json!(true));
        assert_eq!(eval_str("1 == null", json!({})), json!(false));
    }

    // -- Operators ----------------------------------------------------------

    #[test]
    fn comparison_operators() {
        assert_eq!(eval_str("2 > 1", json!({})), json!(true));
        assert_eq!(eval_str("2 <= 1", json!({})), json!(false));
        assert_eq!(eval_str("'a' < 'b'", json!({})), json!(true));
        assert_eq!(eval_str("1 == 1.0", json!({})), json!(true));
        assert_eq!(eval_str("1 != 2", json!({})), json!(true));
    }

    #[test]
    fn ternary_selects_branch() {
        let payload = json!({"premium": 1500});
        assert_eq!(
            eval_str("premium > 1000 ? 'high' : 'low'", payload),
            json!("high")
        );
    }

    // -- Methods ------------------------------------------------------------

    #[test]
    fn string_methods() {
        let payload = json!({"ref": "pol-12345"});
        assert_eq!(eval_str("ref.toUpperCase()", payload.clone()), json!("POL-12345"));
        assert_eq!(eval_str("ref.length()", payload.clone()), json!(9.0));
        assert_eq!(eval_str("ref.contains('123')", payload.clone()), json!(true));
        assert_eq!(eval_str("ref.startsWith('pol')", payload.clone()), json!(true));
        assert_eq!(
            eval_str("ref.replace('pol', 'ref')", payload.clone()),
            json!("ref-12345")
        );
        assert_eq!(eval_str("ref.substring(0, 3)", payload), json!("pol"));
        assert_eq!(eval_str("'  x  '.trim()", json!({})), json!("x"));
    }

    #[test]
    fn method_on_null_receiver_is_null() {
        assert_eq!(eval_str("missing.toUpperCase()", json!({})), Value::Null);
    }

    #[test]
    fn method_on_wrong_type_is_an_error() {
        let err = eval_err("42.toUpperCase()", json!({}));
        assert!(err.cause.contains("toUpperCase"), "{}", err.cause);
    }

    #[test]
    fn math_namespace() {
        assert_eq!(eval_str("math.abs(0 - 5)", json!({})), json!(5.0));
        assert_eq!(eval_str("math.min(3, 7)", json!({})), json!(3.0));
        assert_eq!(eval_str("math.max(3, 7)", json!({})), json!(7.0));
        assert_eq!(eval_str("math.round(2.4)", json!({})), json!(2.0));
        assert_eq!(eval_str("math.floor(2.9)", json!({})), json!(2.0));
        assert_eq!(eval_str("math.ceil(2.1)", json!({})), json!(3.0));
    }

    #[test]
    fn math_with_null_argument_propagates_null() {
        assert_eq!(eval_str("math.abs(missing)", json!({})), Value::Null);
    }

    // -- Multi-expression scripts ------------------------------------------

    #[test]
    fn last_expression_is_the_result() {
        assert_eq!(eval_str("1 + 1; 'done'", json!({})), json!("done"));
        assert_eq!(eval_str("'done';", json!({})), json!("done"));
    }

    // -- Syntax errors ------------------------------------------------------

    #[test]
    fn syntax_errors_surface_at_compile_time() {
        assert!(Script::compile("1 +").is_err());
        assert!(Script::compile("(1 + 2").is_err());
        assert!(Script::compile("'unterminated").is_err());
        assert!(Script::compile("a = b").is_err());
        assert!(Script::compile("").is_err());
        assert!(Script::compile("   ").is_err());
    }

    #[test]
    fn deeply_nested_script_is_a_syntax_error() {
        // Definition-time rejection: a pathological rule body must come back
        // as an ordinary syntax error, not exhaust the stack.
        let src = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
        assert!(Script::compile(&src).is_err());
    }

    #[test]
    fn compiled_script_keeps_source() {
        let script = Script::compile("1 + 1").unwrap();
        assert_eq!(script.source(), "1 + 1");
    }

    #[test]
    fn evaluation_error_carries_source_expression() {
        let err = eval_err("1 / 0", json!({}));
        assert_eq!(err.expression, "1 / 0");
    }
}
