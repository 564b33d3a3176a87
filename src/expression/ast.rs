use crate::core::types::{format_number, Value};

use super::path::Path;

/// A literal in a handler argument list or a boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Literal>),
}

impl Literal {
    /// Convert to a state value. Lists have no inline representation and
    /// must be allocated by the caller.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Literal::Null => Some(Value::Null),
            Literal::Bool(b) => Some(Value::Bool(*b)),
            Literal::Number(n) => Some(Value::Number(*n)),
            Literal::Str(s) => Some(Value::Str(s.clone())),
            Literal::List(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::from(*n as i64)
            }
            Literal::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Literal::Str(s) => serde_json::Value::String(s.clone()),
            Literal::List(items) => serde_json::Value::Array(items.iter().map(Literal::to_json).collect()),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Number(n) => f.write_str(&format_number(*n)),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    /// `==` (numbers and numeric strings compare by value)
    Eq,
    /// `!=`
    Ne,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Parsed boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Literal),
    Path(Path),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Visit every path referenced by the expression.
    pub fn for_each_path(&self, f: &mut dyn FnMut(&Path)) {
        match self {
            Expr::Lit(_) => {}
            Expr::Path(p) => f(p),
            Expr::Unary { expr, .. } => expr.for_each_path(f),
            Expr::Binary { left, right, .. } => {
                left.for_each_path(f);
                right.for_each_path(f);
            }
        }
    }
}
