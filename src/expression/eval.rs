// ============================================================================
// spark-bind - Condition Evaluation
// ============================================================================

use std::cmp::Ordering;

use crate::core::error::{BindError, Result};
use crate::core::types::Value;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::path::Path;

/// Resolves the paths of a condition to values.
pub trait Resolve {
    fn resolve(&self, path: &Path) -> Value;
}

impl<F: Fn(&Path) -> Value> Resolve for F {
    fn resolve(&self, path: &Path) -> Value {
        self(path)
    }
}

/// Evaluate a condition. Logical operators yield booleans.
pub fn evaluate(expr: &Expr, scope: &dyn Resolve) -> Result<Value> {
    match expr {
        Expr::Lit(Literal::List(_)) => Err(BindError::Eval(
            "list literals are not allowed in conditions".to_string(),
        )),
        Expr::Lit(lit) => Ok(lit.to_value().unwrap_or_default()),
        Expr::Path(path) => Ok(scope.resolve(path)),
        Expr::Unary { op: UnaryOp::Not, expr } => Ok(Value::Bool(!evaluate(expr, scope)?.is_truthy())),
        Expr::Unary { op: UnaryOp::Neg, expr } => match evaluate(expr, scope)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(BindError::Eval(format!("cannot negate {:?}", other))),
        },
        Expr::Binary { op: BinaryOp::And, left, right } => {
            Ok(Value::Bool(evaluate(left, scope)?.is_truthy() && evaluate(right, scope)?.is_truthy()))
        }
        Expr::Binary { op: BinaryOp::Or, left, right } => {
            Ok(Value::Bool(evaluate(left, scope)?.is_truthy() || evaluate(right, scope)?.is_truthy()))
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, scope)?;
            let r = evaluate(right, scope)?;
            let result = match op {
                BinaryOp::StrictEq => l == r,
                BinaryOp::StrictNe => l != r,
                BinaryOp::Eq => loose_equals(&l, &r),
                BinaryOp::Ne => !loose_equals(&l, &r),
                BinaryOp::Lt => compare(&l, &r)? == Ordering::Less,
                BinaryOp::Le => compare(&l, &r)? != Ordering::Greater,
                BinaryOp::Gt => compare(&l, &r)? == Ordering::Greater,
                BinaryOp::Ge => compare(&l, &r)? != Ordering::Less,
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            };
            Ok(Value::Bool(result))
        }
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse().ok(),
        Value::Null | Value::Node(_) => None,
    }
}

/// `==`: identical values, or primitives that agree numerically.
fn loose_equals(l: &Value, r: &Value) -> bool {
    if l == r {
        return true;
    }
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) | (Value::Node(_), _) | (_, Value::Node(_)) => false,
        (Value::Str(_), Value::Str(_)) => false,
        _ => match (as_number(l), as_number(r)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(l: &Value, r: &Value) -> Result<Ordering> {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return Ok(a.cmp(b));
    }
    match (as_number(l), as_number(r)) {
        (Some(a), Some(b)) => a
            .partial_cmp(&b)
            .ok_or_else(|| BindError::Eval("comparison with NaN".to_string())),
        _ => Err(BindError::Eval(format!("cannot compare {:?} with {:?}", l, r))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse_condition;

    fn eval(src: &str) -> Result<Value> {
        let scope = |path: &Path| match path.to_text().as_str() {
            "root.count" => Value::from(3),
            "root.name" => Value::from("ann"),
            "root.flag" => Value::from(true),
            _ => Value::Null,
        };
        evaluate(&parse_condition(src).unwrap(), &scope)
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("root.count > 2").unwrap(), Value::Bool(true));
        assert_eq!(eval("root.count <= 2").unwrap(), Value::Bool(false));
        assert_eq!(eval("root.name == 'ann'").unwrap(), Value::Bool(true));
        assert_eq!(eval("root.name < 'bob'").unwrap(), Value::Bool(true));
    }

    #[test]
    fn loose_and_strict_equality_differ() {
        assert_eq!(eval("root.count == '3'").unwrap(), Value::Bool(true));
        assert_eq!(eval("root.count === '3'").unwrap(), Value::Bool(false));
        assert_eq!(eval("root.missing == null").unwrap(), Value::Bool(true));
    }

    #[test]
    fn logic_and_negation() {
        assert_eq!(eval("root.flag && !root.missing").unwrap(), Value::Bool(true));
        assert_eq!(eval("root.missing || root.count < -1").unwrap(), Value::Bool(false));
    }

    #[test]
    fn incomparable_values_fail() {
        assert!(eval("root.missing > 1").is_err());
        assert!(eval("-root.name").is_err());
    }
}
