// ============================================================================
// spark-bind - Markup
// Fragment parser and serializer for the in-memory UI tree
// ============================================================================

use thiserror::Error;

/// Elements that never have children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("markup error at byte {offset}: {message}")]
pub struct MarkupError {
    pub offset: usize,
    pub message: String,
}

impl MarkupError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// A parsed markup node, detached from any document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<MarkupNode>,
    },
    Text(String),
}

// =============================================================================
// PARSER
// =============================================================================

/// Parse a markup fragment (any number of sibling nodes).
pub fn parse_fragment(src: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let mut p = MarkupParser { src, pos: 0 };
    let nodes = p.parse_nodes(None)?;
    if p.pos < src.len() {
        return Err(MarkupError::new(p.pos, "unexpected closing tag"));
    }
    Ok(nodes)
}

struct MarkupParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> MarkupParser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), MarkupError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(MarkupError::new(self.pos, format!("expected `{}`", byte as char)))
        }
    }

    fn name(&mut self) -> Result<String, MarkupError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'<' | b'"' | b'\''))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(MarkupError::new(start, "expected a name"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Parse siblings until `</closing>` (consumed) or end of input.
    fn parse_nodes(&mut self, closing: Option<&str>) -> Result<Vec<MarkupNode>, MarkupError> {
        let mut nodes = Vec::new();
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return match closing {
                    Some(tag) => Err(MarkupError::new(self.pos, format!("unclosed `<{}>`", tag))),
                    None => Ok(nodes),
                };
            }
            if rest.starts_with("<!--") {
                let end = rest
                    .find("-->")
                    .ok_or_else(|| MarkupError::new(self.pos, "unterminated comment"))?;
                self.pos += end + 3;
            } else if rest.starts_with("</") {
                let Some(expected) = closing else {
                    return Ok(nodes);
                };
                let at = self.pos;
                self.pos += 2;
                let name = self.name()?;
                self.skip_ws();
                self.expect(b'>')?;
                if !name.eq_ignore_ascii_case(expected) {
                    return Err(MarkupError::new(
                        at,
                        format!("`</{}>` does not close `<{}>`", name, expected),
                    ));
                }
                return Ok(nodes);
            } else if rest.starts_with('<') {
                nodes.push(self.parse_element()?);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                nodes.push(MarkupNode::Text(decode_entities(&rest[..end])));
                self.pos += end;
            }
        }
    }

    fn parse_element(&mut self) -> Result<MarkupNode, MarkupError> {
        self.expect(b'<')?;
        let tag = self.name()?.to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    self.expect(b'>')?;
                    return Ok(MarkupNode::Element {
                        tag,
                        attrs,
                        children: Vec::new(),
                    });
                }
                None => return Err(MarkupError::new(self.pos, format!("unterminated `<{}`", tag))),
                Some(_) => {
                    let name = self.name()?;
                    self.skip_ws();
                    let value = if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.skip_ws();
                        self.attr_value()?
                    } else {
                        String::new()
                    };
                    match attrs.iter_mut().find(|(n, _)| *n == name) {
                        Some(slot) => slot.1 = value,
                        None => attrs.push((name, value)),
                    }
                }
            }
        }

        let children = if is_void(&tag) {
            Vec::new()
        } else {
            self.parse_nodes(Some(&tag))?
        };
        Ok(MarkupNode::Element { tag, attrs, children })
    }

    fn attr_value(&mut self) -> Result<String, MarkupError> {
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                let start = self.pos + 1;
                let len = self.src[start..]
                    .find(q as char)
                    .ok_or_else(|| MarkupError::new(self.pos, "unterminated attribute value"))?;
                self.pos = start + len + 1;
                Ok(decode_entities(&self.src[start..start + len]))
            }
            _ => Ok(decode_entities(&self.name()?)),
        }
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

// =============================================================================
// SERIALIZER
// =============================================================================

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

/// Serialize nodes back to markup.
pub fn serialize(nodes: &[MarkupNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(text) => out.push_str(&escape_text(text)),
        MarkupNode::Element { tag, attrs, children } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if !is_void(tag) {
                for child in children {
                    write_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// Collapse whitespace: runs become a single space, whitespace-only text
/// between tags disappears.
pub fn normalize(src: &str) -> String {
    match parse_fragment(src) {
        Ok(nodes) => serialize(&collapse(nodes)),
        Err(_) => src.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn collapse(nodes: Vec<MarkupNode>) -> Vec<MarkupNode> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            MarkupNode::Text(text) => {
                if text.trim().is_empty() {
                    return None;
                }
                let mut collapsed = String::with_capacity(text.len());
                let mut in_space = false;
                for ch in text.chars() {
                    if ch.is_whitespace() {
                        if !in_space {
                            collapsed.push(' ');
                        }
                        in_space = true;
                    } else {
                        collapsed.push(ch);
                        in_space = false;
                    }
                }
                Some(MarkupNode::Text(collapsed))
            }
            MarkupNode::Element { tag, attrs, children } => Some(MarkupNode::Element {
                tag,
                attrs,
                children: collapse(children),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_void_tags() {
        let nodes = parse_fragment(r#"<ul id="list"><li class=a>one<br>two</li><input value='x'/></ul>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let MarkupNode::Element { tag, attrs, children } = &nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(tag, "ul");
        assert_eq!(attrs, &vec![("id".to_string(), "list".to_string())]);
        assert_eq!(children.len(), 2);
        assert_eq!(
            serialize(&nodes),
            r#"<ul id="list"><li class="a">one<br>two</li><input value="x"></ul>"#
        );
    }

    #[test]
    fn boolean_attributes_and_entities() {
        let nodes = parse_fragment(r#"<input type="checkbox" checked><p>a &amp; b &lt;c&gt;</p>"#).unwrap();
        assert_eq!(
            serialize(&nodes),
            r#"<input type="checkbox" checked=""><p>a &amp; b &lt;c&gt;</p>"#
        );
    }

    #[test]
    fn comments_are_dropped() {
        let nodes = parse_fragment("<p><!-- note -->x</p>").unwrap();
        assert_eq!(serialize(&nodes), "<p>x</p>");
    }

    #[test]
    fn errors_carry_offsets() {
        let err = parse_fragment("<div><span></div>").unwrap_err();
        assert_eq!(err.offset, 11);
        assert!(parse_fragment("<div>").is_err());
        assert!(parse_fragment("<a href=\"x>").is_err());
        assert!(parse_fragment("text</p>").is_err());
    }

    #[test]
    fn normalize_collapses_whitespace() {
        let src = "\n  <li>\n    <span>{{ todo.title }}</span>\n    done\n  </li>\n";
        assert_eq!(normalize(src), "<li><span>{{ todo.title }}</span> done </li>");
    }
}
