// ============================================================================
// spark-bind - UI Tree
// The element tree the engine binds to
// ============================================================================
//
// The engine never owns a concrete DOM. It talks to a `UiTree`: attribute
// access, prefix queries, child insertion/removal, a text mutation primitive
// and event subscription. `Document` is the in-memory implementation used by
// tests, benches and headless embedders.
// ============================================================================

pub mod document;
pub mod markup;

pub use document::Document;
pub use markup::MarkupError;

use std::fmt;

/// Handle to a node (element or text) in a [`UiTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(pub(crate) usize);

impl DomId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// User-originated events the engine subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Input,
    Change,
}

/// The UI tree collaborator.
///
/// Required methods are the primitives a host tree must provide; the
/// provided methods are derived from them.
pub trait UiTree {
    /// Tag name of an element, `None` for text nodes.
    fn tag(&self, node: DomId) -> Option<String>;
    fn attributes(&self, el: DomId) -> Vec<(String, String)>;
    fn attribute(&self, el: DomId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, el: DomId, name: &str, value: &str);
    fn remove_attribute(&mut self, el: DomId, name: &str);

    fn parent(&self, node: DomId) -> Option<DomId>;
    fn children(&self, node: DomId) -> Vec<DomId>;
    fn next_sibling(&self, node: DomId) -> Option<DomId>;
    /// Insert (or move) `child` under `parent`, before `before` or last.
    fn insert_before(&mut self, parent: DomId, child: DomId, before: Option<DomId>);
    /// Detach a node from its parent. The node stays valid and can be
    /// reinserted.
    fn remove(&mut self, node: DomId);
    fn create_element(&mut self, tag: &str) -> DomId;
    /// Detached text node. Empty text nodes serve as position anchors.
    fn create_text(&mut self, text: &str) -> DomId;
    fn inner_markup(&self, el: DomId) -> String;
    fn set_inner_markup(&mut self, el: DomId, markup: &str) -> Result<(), MarkupError>;

    fn is_text(&self, node: DomId) -> bool;
    fn text(&self, node: DomId) -> String;
    fn set_text(&mut self, node: DomId, text: &str);

    /// Live value of a form control.
    fn value(&self, el: DomId) -> String;
    fn set_value(&mut self, el: DomId, value: &str);
    fn checked(&self, el: DomId) -> bool;
    fn set_checked(&mut self, el: DomId, checked: bool);
    fn style(&self, el: DomId, property: &str) -> Option<String>;
    fn set_style(&mut self, el: DomId, property: &str, value: Option<&str>);

    fn listen(&mut self, el: DomId, kind: EventKind);
    fn is_listening(&self, el: DomId, kind: EventKind) -> bool;

    // =========================================================================
    // PROVIDED
    // =========================================================================

    /// `root` and every node below it, in document order.
    fn descendants(&self, root: DomId) -> Vec<DomId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children = self.children(node);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Elements at or below `root` carrying an attribute whose name starts
    /// with `prefix`.
    fn query_prefix(&self, root: DomId, prefix: &str) -> Vec<DomId> {
        self.descendants(root)
            .into_iter()
            .filter(|&node| {
                !self.is_text(node)
                    && self
                        .attributes(node)
                        .iter()
                        .any(|(name, _)| name.starts_with(prefix))
            })
            .collect()
    }

    fn text_nodes(&self, root: DomId) -> Vec<DomId> {
        self.descendants(root)
            .into_iter()
            .filter(|&node| self.is_text(node))
            .collect()
    }

    /// Whether `node` is `ancestor` or lies below it.
    fn contains(&self, ancestor: DomId, node: DomId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    fn insert_many(&mut self, parent: DomId, nodes: &[DomId], before: Option<DomId>) {
        for &node in nodes {
            self.insert_before(parent, node, before);
        }
    }

    fn has_class(&self, el: DomId, class: &str) -> bool {
        self.attribute(el, "class")
            .is_some_and(|list| list.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, el: DomId, class: &str) {
        if self.has_class(el, class) {
            return;
        }
        let list = match self.attribute(el, "class") {
            Some(list) if !list.trim().is_empty() => format!("{} {}", list.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(el, "class", &list);
    }

    fn remove_class(&mut self, el: DomId, class: &str) {
        if let Some(list) = self.attribute(el, "class") {
            let kept: Vec<&str> = list.split_whitespace().filter(|c| *c != class).collect();
            self.set_attribute(el, "class", &kept.join(" "));
        }
    }
}
