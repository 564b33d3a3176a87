use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::error::ExprError;
use super::lexer::{lex, Span, Token, TokenKind};
use super::path::Path;

/// Parse a boolean condition such as `root.count > 2 && !root.busy`.
pub fn parse_condition(src: &str) -> Result<Expr, ExprError> {
    let mut p = Parser::new(src)?;
    let expr = p.parse_or()?;
    p.expect(TokenKind::Eof)?;
    Ok(expr)
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub(crate) fn new(src: &str) -> Result<Self, ExprError> {
        Ok(Self {
            tokens: lex(src.trim())?,
            pos: 0,
        })
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(crate) fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<(), ExprError> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(ExprError::new(
                self.span().start,
                format!("expected {kind:?}, found {:?}", self.peek().kind),
            ))
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_and()?;
        while self.consume(TokenKind::OrOr) {
            let r = self.parse_and()?;
            e = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(e),
                right: Box::new(r),
            };
        }
        Ok(e)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_equality()?;
        while self.consume(TokenKind::AndAnd) {
            let r = self.parse_equality()?;
            e = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(e),
                right: Box::new(r),
            };
        }
        Ok(e)
    }

    fn parse_equality(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                TokenKind::EqEqEq => BinaryOp::StrictEq,
                TokenKind::NeEq => BinaryOp::StrictNe,
                _ => break,
            };
            self.bump();
            let r = self.parse_comparison()?;
            e = Expr::Binary {
                op,
                left: Box::new(e),
                right: Box::new(r),
            };
        }
        Ok(e)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut e = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            let r = self.parse_unary()?;
            e = Expr::Binary {
                op,
                left: Box::new(e),
                right: Box::new(r),
            };
        }
        Ok(e)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.consume(TokenKind::Bang) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        if self.consume(TokenKind::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let span = self.span();
        match self.peek().kind.clone() {
            TokenKind::Path(text) => {
                self.bump();
                let path = Path::parse(&text)
                    .map_err(|e| ExprError::new(span.start + e.offset, e.message))?;
                Ok(Expr::Path(path))
            }
            _ => Ok(Expr::Lit(self.parse_literal()?)),
        }
    }

    /// Literal grammar shared with handler arguments.
    pub(crate) fn parse_literal(&mut self) -> Result<Literal, ExprError> {
        let span = self.span();
        let tok = self.bump();
        match tok.kind {
            TokenKind::Number(n) => Ok(Literal::Number(n)),
            TokenKind::Minus => match self.bump().kind {
                TokenKind::Number(n) => Ok(Literal::Number(-n)),
                other => Err(ExprError::new(span.start, format!("expected number after `-`, found {other:?}"))),
            },
            TokenKind::Str(s) => Ok(Literal::Str(s)),
            TokenKind::True => Ok(Literal::Bool(true)),
            TokenKind::False => Ok(Literal::Bool(false)),
            TokenKind::Null => Ok(Literal::Null),
            TokenKind::LBracket => {
                let mut items = Vec::new();
                if !self.consume(TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_literal()?);
                        if self.consume(TokenKind::RBracket) {
                            break;
                        }
                        self.expect(TokenKind::Comma)?;
                    }
                }
                Ok(Literal::List(items))
            }
            other => Err(ExprError::new(span.start, format!("unexpected token {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> Box<Expr> {
        Box::new(Expr::Path(Path::parse(text).unwrap()))
    }

    #[test]
    fn precedence_binds_comparison_tighter_than_logic() {
        let e = parse_condition("root.a > 1 && root.b == 'x' || !root.c").unwrap();
        let expected = Expr::Binary {
            op: BinaryOp::Or,
            left: Box::new(Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Gt,
                    left: path("root.a"),
                    right: Box::new(Expr::Lit(Literal::Number(1.0))),
                }),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Eq,
                    left: path("root.b"),
                    right: Box::new(Expr::Lit(Literal::Str("x".into()))),
                }),
            }),
            right: Box::new(Expr::Unary {
                op: UnaryOp::Not,
                expr: path("root.c"),
            }),
        };
        assert_eq!(e, expected);
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(parse_condition("root.a root.b").is_err());
        assert!(parse_condition("root.a ==").is_err());
        assert!(parse_condition("").is_err());
    }

    #[test]
    fn literal_lists_nest() {
        let mut p = Parser::new("[1, 'a', [true, null]]").unwrap();
        assert_eq!(
            p.parse_literal().unwrap(),
            Literal::List(vec![
                Literal::Number(1.0),
                Literal::Str("a".into()),
                Literal::List(vec![Literal::Bool(true), Literal::Null]),
            ])
        );
    }
}
