// ============================================================================
// spark-bind - Binding Records
// One compiled directive occurrence, as a tagged variant
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::dom::DomId;
use crate::expression::{ExprType, HandlerCall, Path};
use crate::expression::ast::Expr;

/// Identity of a binding record. Template records double as the owner id
/// of every record compiled inside their clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Coarse directive type, used by the patch passes to filter the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveType {
    Template,
    Binding,
    Handler,
    UiSetter,
    Computed,
    BooleanExpression,
}

// =============================================================================
// VARIANTS
// =============================================================================

/// Where a list template reads its items from.
#[derive(Debug, Clone, PartialEq)]
pub enum ListSource {
    Root(Path),
    Computed(String),
    /// A list reached through an enclosing loop item
    Object(Path),
}

#[derive(Debug)]
pub struct TemplateBinding {
    pub var: String,
    pub source: ListSource,
    /// Tag of the removed template element
    pub tag: String,
    /// Whitespace-collapsed inner markup
    pub markup: String,
    /// Attributes copied onto every clone (everything but the list directive)
    pub attrs: Vec<(String, String)>,
    /// Empty text node left where the template element was
    pub anchor: DomId,
    /// Rendered clones in list order
    pub clones: RefCell<Vec<DomId>>,
}

/// Setter directives writing one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetterKind {
    Class,
    Src,
    Href,
}

impl SetterKind {
    pub fn attribute(self) -> &'static str {
        match self {
            SetterKind::Class => "class",
            SetterKind::Src => "src",
            SetterKind::Href => "href",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionKind {
    Hide,
    Show,
    If,
    ClassIf(Vec<String>),
}

/// What a conditional reads its boolean from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionSource {
    /// A user-declared computed
    Computed(String),
    /// A computed generated for a root expression
    Synthesized(String),
    /// Expression over the nearest bound object, evaluated every cycle
    Object(Expr),
}

impl ConditionSource {
    pub fn computed_name(&self) -> Option<&str> {
        match self {
            ConditionSource::Computed(name) | ConditionSource::Synthesized(name) => Some(name),
            ConditionSource::Object(_) => None,
        }
    }
}

/// One `{{ expr }}` occurrence of an interpolated text node.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpPart {
    /// Exact placeholder text including braces
    pub placeholder: String,
    pub expr: ExprType,
}

#[derive(Debug)]
pub enum Binding {
    Template(TemplateBinding),
    Model {
        target: ExprType,
        /// Name of the user method translating UI values
        handler: Option<String>,
    },
    Setter {
        kind: SetterKind,
        target: ExprType,
    },
    Handler {
        call: HandlerCall,
    },
    Conditional {
        kind: ConditionKind,
        source: ConditionSource,
        /// Placeholder holding the position of a removed `if` element
        anchor: Cell<Option<DomId>>,
    },
    Interpolation {
        template: String,
        parts: Vec<InterpPart>,
    },
}

impl Binding {
    pub fn directive_type(&self) -> DirectiveType {
        match self {
            Binding::Template(_) => DirectiveType::Template,
            Binding::Model { .. } => DirectiveType::Binding,
            Binding::Setter { .. } | Binding::Interpolation { .. } => DirectiveType::UiSetter,
            Binding::Handler { .. } => DirectiveType::Handler,
            Binding::Conditional {
                source: ConditionSource::Computed(_),
                ..
            } => DirectiveType::Computed,
            Binding::Conditional { .. } => DirectiveType::BooleanExpression,
        }
    }
}

// =============================================================================
// RECORD
// =============================================================================

#[derive(Debug)]
pub struct BindingRecord {
    pub id: RecordId,
    /// Template whose clone this record was compiled in
    pub owner: Option<RecordId>,
    /// Element, or text node for interpolations
    pub node: DomId,
    pub parent: Option<DomId>,
    /// Raw directive text
    pub expression: String,
    pub binding: Binding,
    wired: Cell<bool>,
}

impl BindingRecord {
    pub(crate) fn new(
        id: RecordId,
        owner: Option<RecordId>,
        node: DomId,
        parent: Option<DomId>,
        expression: impl Into<String>,
        binding: Binding,
    ) -> Self {
        Self {
            id,
            owner,
            node,
            parent,
            expression: expression.into(),
            binding,
            wired: Cell::new(false),
        }
    }

    pub fn directive_type(&self) -> DirectiveType {
        self.binding.directive_type()
    }

    /// Whether the record has been applied at least once.
    pub fn is_wired(&self) -> bool {
        self.wired.get()
    }

    pub(crate) fn mark_wired(&self) {
        self.wired.set(true);
    }

    pub fn template(&self) -> Option<&TemplateBinding> {
        match &self.binding {
            Binding::Template(t) => Some(t),
            _ => None,
        }
    }
}
