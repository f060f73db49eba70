//! Tree-walking evaluator with lenient null semantics.

use serde_json::{Map, Value};

use super::parser::{BinOp, Expr, UnaryOp};
use super::Context;

/// Internal evaluation fault; wrapped into `ScriptEvaluationError` by the
/// `Script` entry point.
#[derive(Debug)]
pub(crate) struct EvalError(pub String);

fn fault(message: impl Into<String>) -> EvalError {
    EvalError(message.into())
}

pub(crate) struct Evaluator<'a> {
    ctx: &'a Context,
    remaining_ops: u32,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(ctx: &'a Context, budget: u32) -> Self {
        Self {
            ctx,
            remaining_ops: budget,
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.remaining_ops = self
            .remaining_ops
            .checked_sub(1)
            .ok_or_else(|| fault("evaluation budget exceeded"))?;

        match expr {
            Expr::Number(n) => number(*n),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => Ok(self.lookup(name)),
            Expr::Property(recv, key) => {
                let value = self.eval(recv)?;
                Ok(property(&value, key))
            }
            Expr::Index(recv, index) => {
                let value = self.eval(recv)?;
                let index = self.eval(index)?;
                Ok(indexed(&value, &index))
            }
            Expr::Call(recv, name, args) => self.call(recv, name, args),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => match &value {
                        Value::Null => Ok(Value::Null),
                        Value::Number(n) => number(-n.as_f64().unwrap_or(0.0)),
                        other => Err(fault(format!("cannot negate {}", type_name(other)))),
                    },
                }
            }
            Expr::Binary(op, lhs, rhs) => self.binary(*op, lhs, rhs),
            Expr::Ternary(cond, then, alt) => {
                let cond = self.eval(cond)?;
                if truthy(&cond) {
                    self.eval(then)
                } else {
                    self.eval(alt)
                }
            }
            Expr::Object(pairs) => {
                let mut map = Map::with_capacity(pairs.len());
                for (key, value_expr) in pairs {
                    let value = self.eval(value_expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Array(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element)?);
                }
                Ok(Value::Array(values))
            }
        }
    }

    fn lookup(&self, name: &str) -> Value {
        if let Some(value) = self.ctx.get(name) {
            return value.clone();
        }
        if name == "message" {
            return self.ctx.root().clone();
        }
        Value::Null
    }

    // -- Operators ----------------------------------------------------------

    fn binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        // Logical operators short-circuit and always produce a boolean.
        match op {
            BinOp::And => {
                let lhs = self.eval(lhs)?;
                if !truthy(&lhs) {
                    return Ok(Value::Bool(false));
                }
                let rhs = self.eval(rhs)?;
                return Ok(Value::Bool(truthy(&rhs)));
            }
            BinOp::Or => {
                let lhs = self.eval(lhs)?;
                if truthy(&lhs) {
                    return Ok(Value::Bool(true));
                }
                let rhs = self.eval(rhs)?;
                return Ok(Value::Bool(truthy(&rhs)));
            }
            _ => {}
        }

        let lhs = self.eval(lhs)?;
        let rhs = self.eval(rhs)?;

        match op {
            BinOp::Add => add(&lhs, &rhs),
            BinOp::Sub => arithmetic(&lhs, &rhs, "subtract", |a, b| Ok(a - b)),
            BinOp::Mul => arithmetic(&lhs, &rhs, "multiply", |a, b| Ok(a * b)),
            BinOp::Div => arithmetic(&lhs, &rhs, "divide", |a, b| {
                if b == 0.0 {
                    Err(fault("division by zero"))
                } else {
                    Ok(a / b)
                }
            }),
            BinOp::Rem => arithmetic(&lhs, &rhs, "take the remainder of", |a, b| {
                if b == 0.0 {
                    Err(fault("division by zero"))
                } else {
                    Ok(a % b)
                }
            }),
            BinOp::Eq => Ok(Value::Bool(value_eq(&lhs, &rhs))),
            BinOp::Ne => Ok(Value::Bool(!value_eq(&lhs, &rhs))),
            BinOp::Lt => ordering(&lhs, &rhs, |o| o == std::cmp::Ordering::Less),
            BinOp::Le => ordering(&lhs, &rhs, |o| o != std::cmp::Ordering::Greater),
            BinOp::Gt => ordering(&lhs, &rhs, |o| o == std::cmp::Ordering::Greater),
            BinOp::Ge => ordering(&lhs, &rhs, |o| o != std::cmp::Ordering::Less),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    // -- Method calls -------------------------------------------------------

    fn call(&mut self, recv: &Expr, name: &str, args: &[Expr]) -> Result<Value, EvalError> {
        // `math` is a reserved built-in namespace, not a context value.
        if matches!(recv, Expr::Ident(ns) if ns == "math") {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval(arg)?);
            }
            return math_call(name, &values);
        }

        let receiver = self.eval(recv)?;
        if receiver.is_null() {
            // Null-safe: a method on null yields null, matching the lenient
            // navigation semantics.
            return Ok(Value::Null);
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        method_call(&receiver, name, &values)
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn number(n: f64) -> Result<Value, EvalError> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| fault("arithmetic produced a non-finite number"))
}

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Truthiness for boolean positions: null is false, empty strings and
/// containers are false, zero is false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(xs) => !xs.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

/// Render a value for string concatenation. Null renders as `"null"`;
/// integral numbers drop the decimal point.
fn render(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Equality that compares numbers numerically regardless of their JSON
/// representation (integer vs float).
fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match (as_f64(lhs), as_f64(rhs)) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    if lhs.is_string() || rhs.is_string() {
        return Ok(Value::String(format!("{}{}", render(lhs), render(rhs))));
    }
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    match (as_f64(lhs), as_f64(rhs)) {
        (Some(a), Some(b)) => number(a + b),
        _ => Err(fault(format!(
            "cannot add {} and {}",
            type_name(lhs),
            type_name(rhs)
        ))),
    }
}

fn arithmetic(
    lhs: &Value,
    rhs: &Value,
    verb: &str,
    op: impl Fn(f64, f64) -> Result<f64, EvalError>,
) -> Result<Value, EvalError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    match (as_f64(lhs), as_f64(rhs)) {
        (Some(a), Some(b)) => number(op(a, b)?),
        _ => Err(fault(format!(
            "cannot {verb} {} and {}",
            type_name(lhs),
            type_name(rhs)
        ))),
    }
}

fn ordering(
    lhs: &Value,
    rhs: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, EvalError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        let ord = a
            .partial_cmp(&b)
            .ok_or_else(|| fault("cannot order non-finite numbers"))?;
        return Ok(Value::Bool(accept(ord)));
    }
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return Ok(Value::Bool(accept(a.cmp(b))));
    }
    Err(fault(format!(
        "cannot compare {} and {}",
        type_name(lhs),
        type_name(rhs)
    )))
}

fn property(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn indexed(value: &Value, index: &Value) -> Value {
    match (value, index) {
        (Value::Array(xs), Value::Number(n)) => n
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0)
            .and_then(|f| xs.get(f as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Object(map), Value::String(key)) => {
            map.get(key).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Method allowlist
// ---------------------------------------------------------------------------

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(fault(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn expect_string<'v>(name: &str, arg: &'v Value) -> Result<Option<&'v str>, EvalError> {
    match arg {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(fault(format!(
            "{name} expects a string argument, got {}",
            type_name(other)
        ))),
    }
}

fn method_call(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::Array(xs) => array_method(xs, name, args),
        other => Err(fault(format!(
            "cannot call method '{name}' on {}",
            type_name(other)
        ))),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "toUpperCase" => {
            expect_arity(name, args, 0)?;
            Ok(Value::String(s.to_uppercase()))
        }
        "toLowerCase" => {
            expect_arity(name, args, 0)?;
            Ok(Value::String(s.to_lowercase()))
        }
        "trim" => {
            expect_arity(name, args, 0)?;
            Ok(Value::String(s.trim().to_string()))
        }
        "length" => {
            expect_arity(name, args, 0)?;
            number(s.chars().count() as f64)
        }
        "contains" | "startsWith" | "endsWith" => {
            expect_arity(name, args, 1)?;
            let Some(needle) = expect_string(name, &args[0])? else {
                return Ok(Value::Null);
            };
            let result = match name {
                "contains" => s.contains(needle),
                "startsWith" => s.starts_with(needle),
                _ => s.ends_with(needle),
            };
            Ok(Value::Bool(result))
        }
        "replace" => {
            expect_arity(name, args, 2)?;
            let (Some(from), Some(to)) = (
                expect_string(name, &args[0])?,
                expect_string(name, &args[1])?,
            ) else {
                return Ok(Value::Null);
            };
            Ok(Value::String(s.replace(from, to)))
        }
        "substring" => {
            if args.is_empty() || args.len() > 2 {
                return Err(fault(format!(
                    "substring expects 1 or 2 arguments, got {}",
                    args.len()
                )));
            }
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            let start = index_arg("substring", &args[0])?;
            let chars: Vec<char> = s.chars().collect();
            let end = match args.get(1) {
                Some(arg) => index_arg("substring", arg)?.min(chars.len()),
                None => chars.len(),
            };
            let start = start.min(end);
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        _ => Err(fault(format!("unknown string method '{name}'"))),
    }
}

fn array_method(xs: &[Value], name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "length" => {
            expect_arity(name, args, 0)?;
            number(xs.len() as f64)
        }
        "contains" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Bool(xs.iter().any(|x| value_eq(x, &args[0]))))
        }
        _ => Err(fault(format!("unknown array method '{name}'"))),
    }
}

fn index_arg(name: &str, arg: &Value) -> Result<usize, EvalError> {
    as_f64(arg)
        .filter(|f| *f >= 0.0 && f.fract() == 0.0)
        .map(|f| f as usize)
        .ok_or_else(|| {
            fault(format!(
                "{name} expects a non-negative integer index, got {}",
                type_name(arg)
            ))
        })
}

// ---------------------------------------------------------------------------
// Math namespace
// ---------------------------------------------------------------------------

fn math_call(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    // Null arguments propagate null, like arithmetic.
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }

    let numeric = |arg: &Value| {
        as_f64(arg).ok_or_else(|| {
            fault(format!(
                "math.{name} expects numeric arguments, got {}",
                type_name(arg)
            ))
        })
    };

    match name {
        "abs" | "round" | "floor" | "ceil" => {
            expect_arity(name, args, 1)?;
            let x = numeric(&args[0])?;
            let result = match name {
                "abs" => x.abs(),
                "round" => x.round(),
                "floor" => x.floor(),
                _ => x.ceil(),
            };
            number(result)
        }
        "min" | "max" => {
            expect_arity(name, args, 2)?;
            let a = numeric(&args[0])?;
            let b = numeric(&args[1])?;
            number(if name == "min" { a.min(b) } else { a.max(b) })
        }
        _ => Err(fault(format!("unknown math function '{name}'"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::{Context, Script};
    use super::*;
    use serde_json::json;

    #[test]
    fn budget_exhaustion_is_an_evaluation_error() {
        let script = Script::compile("1 + 2 + 3 + 4").unwrap();
        let ctx = Context::from_payload(&json!({}));
        // The compiled tree needs more than two operations to evaluate.
        let mut evaluator = Evaluator::new(&ctx, 2);
        let err = evaluator.eval(&script.exprs[0]).unwrap_err();
        assert!(err.0.contains("budget"), "{}", err.0);
    }

    #[test]
    fn default_budget_covers_ordinary_scripts() {
        let script = Script::compile("math.max(1, 2) + 'x'.length()").unwrap();
        let ctx = Context::from_payload(&json!({}));
        assert_eq!(script.eval(&ctx).unwrap(), json!(3.0));
    }

    #[test]
    fn render_formats_integral_numbers_without_decimals() {
        assert_eq!(render(&json!(1050.0)), "1050");
        assert_eq!(render(&json!(2.5)), "2.5");
        assert_eq!(render(&json!("s")), "s");
        assert_eq!(render(&Value::Null), "null");
    }

    #[test]
    fn truthiness_rules() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!([1])));
        assert!(!truthy(&json!([])));
    }

    #[test]
    fn value_eq_ignores_number_representation() {
        assert!(value_eq(&json!(2), &json!(2.0)));
        assert!(!value_eq(&json!(2), &json!("2")));
    }
}
