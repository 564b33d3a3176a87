// ============================================================================
// spark-bind - Expression Classifier
// Syntactic classification of directive expressions (no evaluation)
// ============================================================================

use std::collections::HashSet;

use crate::core::config::EngineConfig;
use crate::core::constants::*;
use crate::core::error::{BindError, Result};

use super::ast::Expr;
use super::call::HandlerCall;
use super::parser::parse_condition;
use super::path::{has_separator, Path};

// =============================================================================
// DIRECTIVE KIND
// =============================================================================

/// Which directive an expression was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    List,
    Bind,
    Click,
    Class,
    ClassIf,
    Hide,
    Show,
    If,
    Src,
    Href,
    Interpolation,
}

impl DirectiveKind {
    /// Map an attribute suffix to its directive.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            DIR_FOR => DirectiveKind::List,
            DIR_BIND => DirectiveKind::Bind,
            DIR_CLICK => DirectiveKind::Click,
            DIR_CLASS => DirectiveKind::Class,
            DIR_CLASS_IF => DirectiveKind::ClassIf,
            DIR_HIDE => DirectiveKind::Hide,
            DIR_SHOW => DirectiveKind::Show,
            DIR_IF => DirectiveKind::If,
            DIR_SRC => DirectiveKind::Src,
            DIR_HREF => DirectiveKind::Href,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::List => DIR_FOR,
            DirectiveKind::Bind => DIR_BIND,
            DirectiveKind::Click => DIR_CLICK,
            DirectiveKind::Class => DIR_CLASS,
            DirectiveKind::ClassIf => DIR_CLASS_IF,
            DirectiveKind::Hide => DIR_HIDE,
            DirectiveKind::Show => DIR_SHOW,
            DirectiveKind::If => DIR_IF,
            DirectiveKind::Src => DIR_SRC,
            DirectiveKind::Href => DIR_HREF,
            DirectiveKind::Interpolation => "interpolation",
        }
    }

    /// Attribute setters and the two-way binding share path rules.
    pub fn is_path_binding(self) -> bool {
        matches!(
            self,
            DirectiveKind::Bind | DirectiveKind::Class | DirectiveKind::Src | DirectiveKind::Href
        )
    }

    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            DirectiveKind::Hide | DirectiveKind::Show | DirectiveKind::If | DirectiveKind::ClassIf
        )
    }
}

// =============================================================================
// EXPRESSION TYPE
// =============================================================================

/// Classification result.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprType {
    /// Path starting at the root alias
    RootPath(Path),
    /// Path starting at a loop variable / bound object
    ObjectPath(Path),
    /// `name(args...)`
    Handler(HandlerCall),
    /// Boolean expression whose paths all start at the root alias
    RootExpr(Expr),
    /// Boolean expression reading the nearest bound object
    ObjectExpr(Expr),
    /// Reference to a named computed property
    ComputedRef(String),
    /// The loop index keyword
    Index,
    /// The bound object itself (`{{ item }}`)
    ObjectRef(String),
}

impl ExprType {
    pub fn as_root_path(&self) -> Option<&Path> {
        match self {
            ExprType::RootPath(p) => Some(p),
            _ => None,
        }
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Classifies expressions against the configured aliases and the set of
/// known computed property names.
#[derive(Debug, Clone)]
pub struct Classifier {
    root_alias: String,
    index_keyword: String,
    computed: HashSet<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Classifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            root_alias: config.root_alias.clone(),
            index_keyword: config.index_keyword.clone(),
            computed: HashSet::new(),
        }
    }

    /// Builder method: names that classify as computed references in
    /// interpolations.
    pub fn with_computed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.computed.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn add_computed(&mut self, name: impl Into<String>) {
        self.computed.insert(name.into());
    }

    fn is_root_path(&self, text: &str) -> bool {
        match text.strip_prefix(self.root_alias.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
            None => false,
        }
    }

    fn path(&self, kind: DirectiveKind, text: &str) -> Result<Path> {
        Path::parse(text).map_err(|e| BindError::invalid(kind.name(), text, e.to_string()))
    }

    /// Classify `expression` as written in a `kind` directive.
    pub fn classify(&self, expression: &str, kind: DirectiveKind) -> Result<ExprType> {
        let text = expression.trim();
        let has_parens = text.contains('(') || text.contains(')');
        let invalid = |reason: &str| Err(BindError::invalid(kind.name(), text, reason));

        match kind {
            DirectiveKind::Bind | DirectiveKind::Class | DirectiveKind::Src | DirectiveKind::Href => {
                if has_parens {
                    return invalid("calls are not allowed");
                }
                if !has_separator(text) {
                    return invalid("expected a property path");
                }
                let path = self.path(kind, text)?;
                if self.is_root_path(text) {
                    Ok(ExprType::RootPath(path))
                } else {
                    Ok(ExprType::ObjectPath(path))
                }
            }

            DirectiveKind::Click => {
                if !(text.contains('(') && text.contains(')')) {
                    return invalid("expected a call such as `name(args)`");
                }
                HandlerCall::parse(text)
                    .map(ExprType::Handler)
                    .map_err(|e| BindError::invalid(kind.name(), text, e.to_string()))
            }

            DirectiveKind::Hide | DirectiveKind::Show | DirectiveKind::If | DirectiveKind::ClassIf => {
                if has_parens {
                    return invalid("calls and grouping are not allowed");
                }
                let expr = parse_condition(text)
                    .map_err(|e| BindError::invalid(kind.name(), text, e.to_string()))?;
                if let Expr::Path(path) = &expr {
                    if path.is_single() && !has_separator(text) {
                        return Ok(ExprType::ComputedRef(text.to_string()));
                    }
                }
                let mut all_rooted = true;
                expr.for_each_path(&mut |p| {
                    if p.head() != Some(self.root_alias.as_str()) {
                        all_rooted = false;
                    }
                });
                if all_rooted {
                    Ok(ExprType::RootExpr(expr))
                } else {
                    Ok(ExprType::ObjectExpr(expr))
                }
            }

            DirectiveKind::List => {
                if has_parens {
                    return invalid("calls are not allowed");
                }
                if self.is_root_path(text) {
                    Ok(ExprType::RootPath(self.path(kind, text)?))
                } else if !has_separator(text) && !text.is_empty() {
                    self.path(kind, text)?;
                    Ok(ExprType::ComputedRef(text.to_string()))
                } else {
                    // A list held by an enclosing loop item (nested templates)
                    Ok(ExprType::ObjectPath(self.path(kind, text)?))
                }
            }

            DirectiveKind::Interpolation => {
                if has_parens {
                    return invalid("calls are not allowed");
                }
                if text == self.index_keyword {
                    Ok(ExprType::Index)
                } else if self.is_root_path(text) {
                    Ok(ExprType::RootPath(self.path(kind, text)?))
                } else if has_separator(text) {
                    Ok(ExprType::ObjectPath(self.path(kind, text)?))
                } else if self.computed.contains(text) {
                    Ok(ExprType::ComputedRef(text.to_string()))
                } else {
                    self.path(kind, text)?;
                    Ok(ExprType::ObjectRef(text.to_string()))
                }
            }
        }
    }
}

/// Classify with the default aliases and no known computed names.
///
/// ```
/// use spark_bind::expression::{classify, DirectiveKind, ExprType};
///
/// assert!(matches!(classify("root.user.age", DirectiveKind::Bind), Ok(ExprType::RootPath(_))));
/// assert!(matches!(classify("isActive", DirectiveKind::Show), Ok(ExprType::ComputedRef(_))));
/// assert!(classify("root.f()", DirectiveKind::Bind).is_err());
/// ```
pub fn classify(expression: &str, kind: DirectiveKind) -> Result<ExprType> {
    Classifier::default().classify(expression, kind)
}

// =============================================================================
// LOOP EXPRESSIONS
// =============================================================================

/// Split `item in root.items` into the loop variable and the source text.
///
/// A missing variable is fatal for the directive.
pub fn parse_loop(expression: &str) -> Result<(String, String)> {
    let text = expression.trim();
    let missing = || BindError::MissingLoopVariable {
        expression: text.to_string(),
    };

    let mut words = text.split_whitespace();
    let first = words.next().ok_or_else(missing)?;
    if first == "in" {
        return Err(missing());
    }
    match words.next() {
        Some("in") => {}
        _ => {
            return Err(BindError::invalid(
                DIR_FOR,
                text,
                "expected `<name> in <source>`",
            ));
        }
    }
    let source: Vec<&str> = words.collect();
    if source.is_empty() {
        return Err(BindError::invalid(DIR_FOR, text, "missing list source"));
    }
    let var_ok = first
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if !var_ok {
        return Err(BindError::invalid(DIR_FOR, text, "loop variable must be an identifier"));
    }
    Ok((first.to_string(), source.join(" ")))
}

/// Split a conditional class directive `active, done : condition` into
/// class names and the condition text.
pub fn parse_class_condition(expression: &str) -> Result<(Vec<String>, String)> {
    let (classes, condition) = expression
        .split_once(':')
        .ok_or_else(|| BindError::invalid(DIR_CLASS_IF, expression, "expected `classes : condition`"))?;
    let classes = split_classes(classes);
    if classes.is_empty() {
        return Err(BindError::invalid(DIR_CLASS_IF, expression, "no class names given"));
    }
    Ok((classes, condition.trim().to_string()))
}

/// Class names separated by commas and/or whitespace.
pub fn split_classes(text: &str) -> Vec<String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ast::Literal;
    use proptest::prelude::*;

    #[test]
    fn handler_call_with_arguments() {
        match classify("doSomething(1, 'x', true)", DirectiveKind::Click).unwrap() {
            ExprType::Handler(call) => {
                assert_eq!(call.name, "doSomething");
                assert_eq!(
                    call.args,
                    vec![Literal::Number(1.0), Literal::Str("x".into()), Literal::Bool(true)]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(classify("doSomething", DirectiveKind::Click).is_err());
    }

    #[test]
    fn path_bindings() {
        assert!(matches!(
            classify("root.user.age", DirectiveKind::Bind).unwrap(),
            ExprType::RootPath(p) if p.to_text() == "root.user.age"
        ));
        assert!(matches!(
            classify("item.name", DirectiveKind::Src).unwrap(),
            ExprType::ObjectPath(_)
        ));
        assert!(classify("name", DirectiveKind::Href).is_err());
        assert!(classify("root.name()", DirectiveKind::Class).is_err());
    }

    #[test]
    fn conditionals() {
        assert_eq!(
            classify("isActive", DirectiveKind::Show).unwrap(),
            ExprType::ComputedRef("isActive".into())
        );
        assert!(matches!(
            classify("root.count > 2", DirectiveKind::If).unwrap(),
            ExprType::RootExpr(_)
        ));
        assert!(matches!(
            classify("!root.busy", DirectiveKind::Hide).unwrap(),
            ExprType::RootExpr(_)
        ));
        assert!(matches!(
            classify("item.done", DirectiveKind::ClassIf).unwrap(),
            ExprType::ObjectExpr(_)
        ));
        assert!(classify("(root.a)", DirectiveKind::If).is_err());
        assert!(classify("root.a >", DirectiveKind::If).is_err());
    }

    #[test]
    fn list_sources() {
        assert!(matches!(
            classify("root.items", DirectiveKind::List).unwrap(),
            ExprType::RootPath(_)
        ));
        assert_eq!(
            classify("visible", DirectiveKind::List).unwrap(),
            ExprType::ComputedRef("visible".into())
        );
        assert!(matches!(
            classify("item.children", DirectiveKind::List).unwrap(),
            ExprType::ObjectPath(_)
        ));
        assert!(classify("root.load()", DirectiveKind::List).is_err());
    }

    #[test]
    fn interpolations() {
        let classifier = Classifier::default().with_computed(["total"]);
        let kind = DirectiveKind::Interpolation;
        assert_eq!(classifier.classify("index", kind).unwrap(), ExprType::Index);
        assert!(matches!(classifier.classify("root.user.name", kind).unwrap(), ExprType::RootPath(_)));
        assert!(matches!(classifier.classify("item.name", kind).unwrap(), ExprType::ObjectPath(_)));
        assert_eq!(classifier.classify("total", kind).unwrap(), ExprType::ComputedRef("total".into()));
        assert_eq!(classifier.classify("item", kind).unwrap(), ExprType::ObjectRef("item".into()));
        assert!(classifier.classify("a + b", kind).is_err());
        assert!(classifier.classify("f(x)", kind).is_err());
    }

    #[test]
    fn custom_root_alias() {
        let config = EngineConfig {
            root_alias: "app".into(),
            ..EngineConfig::default()
        };
        let classifier = Classifier::new(&config);
        assert!(matches!(
            classifier.classify("app.user", DirectiveKind::Bind).unwrap(),
            ExprType::RootPath(_)
        ));
        assert!(matches!(
            classifier.classify("root.user", DirectiveKind::Bind).unwrap(),
            ExprType::ObjectPath(_)
        ));
    }

    #[test]
    fn loop_expressions() {
        assert_eq!(
            parse_loop(" todo in root.todos ").unwrap(),
            ("todo".to_string(), "root.todos".to_string())
        );
        assert!(matches!(
            parse_loop("in root.todos"),
            Err(BindError::MissingLoopVariable { .. })
        ));
        assert!(matches!(parse_loop(""), Err(BindError::MissingLoopVariable { .. })));
        assert!(matches!(parse_loop("root.todos"), Err(BindError::InvalidExpression { .. })));
        assert!(parse_loop("a in").is_err());
    }

    #[test]
    fn class_conditions() {
        let (classes, cond) = parse_class_condition("active, done : item.done").unwrap();
        assert_eq!(classes, vec!["active", "done"]);
        assert_eq!(cond, "item.done");
        assert!(parse_class_condition("item.done").is_err());
        assert!(parse_class_condition(" : item.done").is_err());
    }

    proptest! {
        #[test]
        fn anything_with_parens_is_never_a_path(text in "[a-z.]{0,8}\\([a-z, ]{0,8}\\)") {
            for kind in [DirectiveKind::Bind, DirectiveKind::Class, DirectiveKind::If, DirectiveKind::Interpolation] {
                prop_assert!(classify(&text, kind).is_err());
            }
        }

        #[test]
        fn rooted_paths_classify_as_root(tail in "[a-z]{1,6}(\\.[a-z]{1,6}){0,3}") {
            let text = format!("root.{}", tail);
            let is_root_path = matches!(classify(&text, DirectiveKind::Bind), Ok(ExprType::RootPath(_)));
            prop_assert!(is_root_path);
        }
    }
}
