use std::fmt;

use super::ast::Literal;
use super::error::ExprError;
use super::lexer::TokenKind;
use super::parser::Parser;

/// A parsed `name(arg, ...)` handler expression.
///
/// Arguments are literals only: strings, numbers, booleans, null and
/// bracketed lists of those.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerCall {
    pub name: String,
    pub args: Vec<Literal>,
}

impl HandlerCall {
    pub fn parse(src: &str) -> Result<Self, ExprError> {
        let mut p = Parser::new(src)?;
        let span = p.span();
        let name = match p.bump().kind {
            TokenKind::Path(text) if !text.contains('.') && !text.contains('[') => text,
            other => {
                return Err(ExprError::new(
                    span.start,
                    format!("expected handler name, found {other:?}"),
                ));
            }
        };

        p.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !p.consume(TokenKind::RParen) {
            loop {
                args.push(p.parse_literal()?);
                if p.consume(TokenKind::RParen) {
                    break;
                }
                p.expect(TokenKind::Comma)?;
            }
        }
        p.expect(TokenKind::Eof)?;

        Ok(Self { name, args })
    }
}

impl fmt::Display for HandlerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}
