use super::error::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) start: usize,
    pub(crate) end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// A path such as `root.items[2].done` (kept as text, parsed later)
    Path(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    OrOr,
    AndAnd,
    Bang,
    Minus,
    EqEq,
    EqEqEq,
    Ne,
    NeEq,
    Lt,
    Le,
    Gt,
    Ge,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

pub(crate) fn lex(src: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        let two = |a: u8, b: u8| c == a && bytes.get(i + 1) == Some(&b);
        let (kind, len) = if two(b'=', b'=') && bytes.get(i + 2) == Some(&b'=') {
            (TokenKind::EqEqEq, 3)
        } else if two(b'!', b'=') && bytes.get(i + 2) == Some(&b'=') {
            (TokenKind::NeEq, 3)
        } else if two(b'|', b'|') {
            (TokenKind::OrOr, 2)
        } else if two(b'&', b'&') {
            (TokenKind::AndAnd, 2)
        } else if two(b'=', b'=') {
            (TokenKind::EqEq, 2)
        } else if two(b'!', b'=') {
            (TokenKind::Ne, 2)
        } else if two(b'<', b'=') {
            (TokenKind::Le, 2)
        } else if two(b'>', b'=') {
            (TokenKind::Ge, 2)
        } else {
            match c {
                b'!' => (TokenKind::Bang, 1),
                b'-' => (TokenKind::Minus, 1),
                b'<' => (TokenKind::Lt, 1),
                b'>' => (TokenKind::Gt, 1),
                b',' => (TokenKind::Comma, 1),
                b'[' => (TokenKind::LBracket, 1),
                b']' => (TokenKind::RBracket, 1),
                b'(' => (TokenKind::LParen, 1),
                b')' => (TokenKind::RParen, 1),
                b'\'' | b'"' => {
                    let (s, len) = lex_string(src, i)?;
                    (TokenKind::Str(s), len)
                }
                b'0'..=b'9' => {
                    let mut j = i;
                    while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b'.') {
                        j += 1;
                    }
                    let text = &src[i..j];
                    let n = text
                        .parse::<f64>()
                        .map_err(|_| ExprError::new(i, format!("invalid number `{}`", text)))?;
                    (TokenKind::Number(n), j - i)
                }
                c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                    let len = lex_path_len(bytes, i);
                    let text = &src[i..i + len];
                    let kind = match text {
                        "true" => TokenKind::True,
                        "false" => TokenKind::False,
                        "null" | "undefined" => TokenKind::Null,
                        _ => TokenKind::Path(text.to_string()),
                    };
                    (kind, len)
                }
                other => {
                    return Err(ExprError::new(
                        i,
                        format!("unexpected character `{}`", other as char),
                    ));
                }
            }
        };

        i += len;
        out.push(Token {
            kind,
            span: Span { start, end: i },
        });
    }

    out.push(Token {
        kind: TokenKind::Eof,
        span: Span {
            start: src.len(),
            end: src.len(),
        },
    });
    Ok(out)
}

/// Length of a path token: identifiers joined by `.` plus `[digits]` groups.
fn lex_path_len(bytes: &[u8], start: usize) -> usize {
    let ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'$';
    let mut j = start;
    loop {
        while j < bytes.len() && ident(bytes[j]) {
            j += 1;
        }
        match bytes.get(j) {
            Some(b'.') if bytes.get(j + 1).is_some_and(|b| ident(*b)) => j += 1,
            Some(b'[') => {
                let mut k = j + 1;
                while k < bytes.len() && bytes[k].is_ascii_digit() {
                    k += 1;
                }
                if k > j + 1 && bytes.get(k) == Some(&b']') {
                    j = k + 1;
                } else {
                    return j - start;
                }
            }
            _ => return j - start,
        }
    }
}

fn lex_string(src: &str, start: usize) -> Result<(String, usize), ExprError> {
    let bytes = src.as_bytes();
    let quote = bytes[start];
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();
    while let Some((off, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, esc)) => out.push(esc),
                None => break,
            },
            c if c as u32 == quote as u32 => return Ok((out, off + 2)),
            c => out.push(c),
        }
    }
    Err(ExprError::new(start, "unterminated string"))
}
