// ============================================================================
// spark-bind - Paths
// Dotted/bracketed addresses into the state tree
// ============================================================================

use std::fmt;

use crate::core::types::Key;

use super::error::ExprError;

/// A parsed path such as `root.items[2].name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Key>,
}

impl Path {
    /// Parse a path. Identifiers may contain letters, digits, `_` and `$`;
    /// brackets hold a list index.
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let text = text.trim();
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut i = 0;
        let mut expect_ident = true;

        while i < bytes.len() {
            match bytes[i] {
                b'.' if !expect_ident => {
                    i += 1;
                    expect_ident = true;
                }
                b'[' if !expect_ident => {
                    let close = text[i..]
                        .find(']')
                        .map(|p| p + i)
                        .ok_or_else(|| ExprError::new(i, "unterminated `[`"))?;
                    let inner = text[i + 1..close].trim();
                    let index = inner
                        .parse::<usize>()
                        .map_err(|_| ExprError::new(i + 1, format!("`{}` is not a list index", inner)))?;
                    segments.push(Key::Index(index));
                    i = close + 1;
                }
                c if expect_ident && is_ident_byte(c) => {
                    let start = i;
                    while i < bytes.len() && is_ident_byte(bytes[i]) {
                        i += 1;
                    }
                    segments.push(Key::Field(text[start..i].to_string()));
                    expect_ident = false;
                }
                c => {
                    return Err(ExprError::new(
                        i,
                        format!("unexpected `{}` in path `{}`", c as char, text),
                    ));
                }
            }
        }

        if expect_ident {
            return Err(ExprError::new(text.len(), "path must end with a name or index"));
        }
        Ok(Self { segments })
    }

    pub fn from_segments(segments: Vec<Key>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Key] {
        &self.segments
    }

    /// First segment name (the root alias or loop variable).
    pub fn head(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Key::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Everything after the first segment.
    pub fn tail(&self) -> &[Key] {
        self.segments.get(1..).unwrap_or(&[])
    }

    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }

    /// Split into (parent segments, last key).
    pub fn split_last(&self) -> Option<(&[Key], &Key)> {
        let (last, parents) = self.segments.split_last()?;
        Some((parents, last))
    }

    /// Canonical text form.
    pub fn to_text(&self) -> String {
        self.segments.iter().fold(String::new(), |acc, key| key.join(&acc))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

/// Whether the text contains a path separator.
pub fn has_separator(text: &str) -> bool {
    text.contains('.') || text.contains('[')
}

/// Whether one path string addresses an ancestor of (or the same slot as)
/// the other. `root.items` and `root.items[2].name` are related;
/// `root.item` and `root.items` are not.
pub fn paths_related(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    match long.strip_prefix(short) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_dots_and_brackets() {
        let path = Path::parse("root.items[2].name").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Key::from("root"),
                Key::from("items"),
                Key::Index(2),
                Key::from("name")
            ]
        );
        assert_eq!(path.head(), Some("root"));
        assert_eq!(path.to_text(), "root.items[2].name");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(Path::parse("").is_err());
        assert!(Path::parse("root.").is_err());
        assert!(Path::parse("root..a").is_err());
        assert!(Path::parse("root[x]").is_err());
        assert!(Path::parse("root[1").is_err());
        assert!(Path::parse("a b").is_err());
    }

    #[test]
    fn related_paths_share_whole_segments() {
        assert!(paths_related("root.items", "root.items[2].name"));
        assert!(paths_related("root.user.name", "root.user"));
        assert!(paths_related("root.a", "root.a"));
        assert!(!paths_related("root.item", "root.items"));
        assert!(!paths_related("root.a", "root.b"));
    }

    proptest! {
        #[test]
        fn canonical_text_reparses(
            head in "[a-z][a-z0-9_]{0,6}",
            rest in prop::collection::vec(
                prop_oneof![
                    "[a-z][a-z0-9_]{0,6}".prop_map(Key::Field),
                    (0usize..50).prop_map(Key::Index),
                ],
                0..5,
            ),
        ) {
            let mut segments = vec![Key::Field(head)];
            segments.extend(rest);
            let path = Path::from_segments(segments);
            let reparsed = Path::parse(&path.to_text()).unwrap();
            prop_assert_eq!(reparsed, path);
        }

        #[test]
        fn a_path_is_related_to_its_extensions(base in "[a-z]{1,5}(\\.[a-z]{1,5}){0,3}", ext in "[a-z]{1,5}") {
            let extended = format!("{}.{}", base, ext);
            prop_assert!(paths_related(&base, &extended));
        }
    }
}
