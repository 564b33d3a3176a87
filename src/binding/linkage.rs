// ============================================================================
// spark-bind - Element Linkage
// Side tables tying UI nodes to the state they are bound to
// ============================================================================
//
// Nothing is stored on the UI tree's own nodes except the two loop metadata
// attributes. Bound objects, loop scopes and the classes a setter applied
// live here, keyed by element or record.
// ============================================================================

use std::collections::HashMap;

use crate::core::types::{Key, NodeId, Value};
use crate::dom::{DomId, UiTree};

use super::record::RecordId;

/// Per-clone loop context.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopScope {
    pub var: String,
    pub index: usize,
    pub item: Value,
    /// Path of the item (`root.todos[2]`)
    pub path: String,
    pub template: RecordId,
}

/// Back-reference of a two-way or setter binding: the object and key it
/// reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSlot {
    pub node: NodeId,
    pub key: Key,
    /// Path of `node`, used when writing back through a proxy
    pub path: String,
    /// Every node visited while resolving, root first
    pub chain: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct Linkage {
    scopes: HashMap<DomId, LoopScope>,
    links: HashMap<RecordId, BoundSlot>,
    classes: HashMap<RecordId, Vec<String>>,
}

impl Linkage {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_scope(&mut self, clone: DomId, scope: LoopScope) {
        self.scopes.insert(clone, scope);
    }

    pub fn scope(&self, clone: DomId) -> Option<&LoopScope> {
        self.scopes.get(&clone)
    }

    /// Nearest enclosing loop scope of `node`. With `var`, prefer the nearest
    /// scope declaring that loop variable.
    pub fn nearest_scope<T: UiTree + ?Sized>(
        &self,
        tree: &T,
        node: DomId,
        var: Option<&str>,
    ) -> Option<&LoopScope> {
        let mut nearest = None;
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(scope) = self.scopes.get(&n) {
                if var.is_none_or(|v| v == scope.var) {
                    return Some(scope);
                }
                nearest.get_or_insert(scope);
            }
            current = tree.parent(n);
        }
        nearest
    }

    pub(crate) fn set_link(&mut self, record: RecordId, slot: BoundSlot) {
        self.links.insert(record, slot);
    }

    pub fn link(&self, record: RecordId) -> Option<&BoundSlot> {
        self.links.get(&record)
    }

    pub(crate) fn set_classes(&mut self, record: RecordId, classes: Vec<String>) -> Vec<String> {
        self.classes.insert(record, classes).unwrap_or_default()
    }

    /// Drop everything attached to pruned records and discarded clones.
    pub(crate) fn forget(&mut self, records: &[RecordId], clones: &[DomId]) {
        for id in records {
            self.links.remove(id);
            self.classes.remove(id);
        }
        for clone in clones {
            self.scopes.remove(clone);
        }
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn scope(var: &str, index: usize) -> LoopScope {
        LoopScope {
            var: var.into(),
            index,
            item: Value::from(index),
            path: format!("root.items[{}]", index),
            template: RecordId(0),
        }
    }

    #[test]
    fn nearest_scope_prefers_matching_variable() {
        let doc = Document::from_markup(
            r#"<div id="outer"><div id="inner"><span id="leaf"></span></div></div>"#,
        )
        .unwrap();
        let outer = doc.query_id("outer").unwrap();
        let inner = doc.query_id("inner").unwrap();
        let leaf = doc.query_id("leaf").unwrap();

        let mut linkage = Linkage::new();
        linkage.set_scope(outer, scope("row", 1));
        linkage.set_scope(inner, scope("cell", 2));

        assert_eq!(linkage.nearest_scope(&doc, leaf, None).unwrap().var, "cell");
        assert_eq!(linkage.nearest_scope(&doc, leaf, Some("row")).unwrap().index, 1);
        assert_eq!(linkage.nearest_scope(&doc, leaf, Some("other")).unwrap().var, "cell");
        assert!(linkage.nearest_scope(&doc, doc.body(), None).is_none());

        linkage.forget(&[], &[inner]);
        assert_eq!(linkage.nearest_scope(&doc, leaf, None).unwrap().var, "row");
    }
}
