// ============================================================================
// spark-bind - Type Definitions
// Values, keys and change notifications shared by every layer
// ============================================================================

use std::fmt;

// =============================================================================
// NODE IDENTITY
// =============================================================================

/// Identity of a non-primitive State Node (object or list) in the store arena.
///
/// Two values referring to the same `NodeId` are the same raw object; this is
/// the identity the proxy cache and the dependency tracker are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A value stored in the state tree.
///
/// Primitives are held inline. Objects and lists live in the store arena and
/// are referenced by [`NodeId`], so `==` on two `Node` values is an identity
/// comparison (strict equality), never a structural one.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Node(NodeId),
}

impl Value {
    /// The node behind this value, if it is an object or list.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by conditional directives.
    ///
    /// `null`, `false`, `0`, `NaN` and the empty string are falsy; nodes are
    /// always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Node(_) => true,
        }
    }

    /// Text form of a primitive (nodes render as their id; the store renders
    /// them as structured text instead).
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Node(id) => id.to_string(),
        }
    }
}

/// Render a number the way UI text expects it: integral values without a
/// fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Value::Node(v)
    }
}

// =============================================================================
// KEY
// =============================================================================

/// A property key: a named field of an object or an index into a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Field(String),
    Index(usize),
}

impl Key {
    /// Whether two keys address the same slot (`Field("2")` and `Index(2)` do).
    pub fn same_slot(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Field(name), Key::Index(i)) | (Key::Index(i), Key::Field(name)) => {
                *name == i.to_string()
            }
            _ => self == other,
        }
    }

    /// Append this key to a parent path: bracket notation for list indices,
    /// dot notation otherwise.
    pub fn join(&self, parent: &str) -> String {
        match self {
            Key::Index(i) => format!("{}[{}]", parent, i),
            Key::Field(name) if parent.is_empty() => name.clone(),
            Key::Field(name) => format!("{}.{}", parent, name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Field(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Field(v)
    }
}

impl From<usize> for Key {
    fn from(v: usize) -> Self {
        Key::Index(v)
    }
}

// =============================================================================
// LIST MUTATORS
// =============================================================================

/// The structural list operations intercepted by the proxy layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListMutator {
    Push,
    Pop,
    Splice,
    Shift,
    Unshift,
    Sort,
    Reverse,
}

impl ListMutator {
    pub const ALL: [ListMutator; 7] = [
        ListMutator::Push,
        ListMutator::Pop,
        ListMutator::Splice,
        ListMutator::Shift,
        ListMutator::Unshift,
        ListMutator::Sort,
        ListMutator::Reverse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ListMutator::Push => "push",
            ListMutator::Pop => "pop",
            ListMutator::Splice => "splice",
            ListMutator::Shift => "shift",
            ListMutator::Unshift => "unshift",
            ListMutator::Sort => "sort",
            ListMutator::Reverse => "reverse",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

// =============================================================================
// CHANGE NOTIFICATION
// =============================================================================

/// What was written in a change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKey {
    /// A single key of an object or list was assigned
    Key(Key),
    /// The `length` pseudo-property of a list changed
    Length,
    /// A structural list operation ran
    Mutator(ListMutator),
}

impl ChangeKey {
    /// Whether list bindings must be re-synchronized for this change.
    pub fn is_structural(&self) -> bool {
        matches!(self, ChangeKey::Length | ChangeKey::Mutator(_))
    }
}

/// One intercepted mutation, delivered synchronously to the change callback.
///
/// For mutators the mutator name doubles as `value` (a string) and `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Path of the written slot (for mutators: the path of the list)
    pub path: String,
    pub value: Value,
    pub key: ChangeKey,
    /// The raw container that was written
    pub target: NodeId,
}

// =============================================================================
// TESTS
// =============================================================================
