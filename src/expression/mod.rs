// ============================================================================
// spark-bind - Expressions
// Paths, boolean conditions, handler calls and classification
// ============================================================================

pub mod ast;
pub mod call;
pub mod classify;
pub mod error;
pub mod eval;
mod lexer;
pub mod parser;
pub mod path;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use call::HandlerCall;
pub use classify::{
    classify, parse_class_condition, parse_loop, split_classes, Classifier, DirectiveKind, ExprType,
};
pub use error::ExprError;
pub use eval::{evaluate, Resolve};
pub use parser::parse_condition;
pub use path::{has_separator, paths_related, Path};

/// A parsed boolean directive expression.
pub type Condition = Expr;
