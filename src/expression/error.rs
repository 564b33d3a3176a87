use thiserror::Error;

/// A lexing or parsing failure inside a directive expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expr error at byte {offset}: {message}")]
pub struct ExprError {
    pub offset: usize,
    pub message: String,
}

impl ExprError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}
