// ============================================================================
// spark-bind - Errors
// ============================================================================

use thiserror::Error;

use crate::dom::markup::MarkupError;
use crate::expression::error::ExprError;

/// Errors raised while compiling directives or dispatching to user code.
///
/// Only [`BindError::MissingLoopVariable`] aborts compilation; everything else
/// is reported to the diagnostic channel and the single binding is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("invalid {directive} expression `{expression}`: {reason}")]
    InvalidExpression {
        directive: String,
        expression: String,
        reason: String,
    },

    #[error("list directive `{expression}` does not declare a loop variable")]
    MissingLoopVariable { expression: String },

    #[error("no method named `{0}` is registered")]
    UnknownMethod(String),

    #[error("no computed property named `{0}` is registered")]
    UnknownComputed(String),

    #[error(transparent)]
    Parse(#[from] ExprError),

    #[error("evaluation failed: {0}")]
    Eval(String),

    #[error(transparent)]
    Markup(#[from] MarkupError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BindError {
    pub(crate) fn invalid(
        directive: impl Into<String>,
        expression: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        BindError::InvalidExpression {
            directive: directive.into(),
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must stop compilation instead of skipping a binding.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BindError::MissingLoopVariable { .. })
    }
}

pub type Result<T> = std::result::Result<T, BindError>;
