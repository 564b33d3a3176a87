// ============================================================================
// spark-bind - Binding Registry
// ============================================================================

use std::collections::HashSet;
use std::rc::Rc;

use crate::dom::DomId;

use super::record::{Binding, BindingRecord, DirectiveType, RecordId};

/// Ordered, append-only list of binding records.
///
/// Passes that may change the registry iterate a [`Registry::snapshot`]
/// instead of the live list.
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<Rc<BindingRecord>>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_id(&mut self) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn append(&mut self, record: BindingRecord) -> Rc<BindingRecord> {
        let record = Rc::new(record);
        self.records.push(record.clone());
        record
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Rc<BindingRecord>> {
        self.records.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<BindingRecord>> {
        self.records.iter()
    }

    pub fn get(&self, id: RecordId) -> Option<Rc<BindingRecord>> {
        self.records.iter().find(|r| r.id == id).cloned()
    }

    pub fn of_type(&self, ty: DirectiveType) -> Vec<Rc<BindingRecord>> {
        self.records
            .iter()
            .filter(|r| r.directive_type() == ty)
            .cloned()
            .collect()
    }

    /// Records compiled on `node`.
    pub fn on_node(&self, node: DomId) -> Vec<Rc<BindingRecord>> {
        self.records.iter().filter(|r| r.node == node).cloned().collect()
    }

    /// Remove every record owned by `owner`, and recursively every record
    /// owned by a removed template. Returns the removed records.
    pub(crate) fn prune_owner(&mut self, owner: RecordId) -> Vec<Rc<BindingRecord>> {
        let mut owners = HashSet::from([owner]);
        let mut removed = Vec::new();
        loop {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
                .into_iter()
                .partition(|r| r.owner.is_some_and(|o| owners.contains(&o)));
            self.records = kept;
            if gone.is_empty() {
                break;
            }
            for record in &gone {
                if matches!(record.binding, Binding::Template(_)) {
                    owners.insert(record.id);
                }
            }
            removed.extend(gone);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::HandlerCall;

    fn handler(reg: &mut Registry, owner: Option<RecordId>) -> RecordId {
        let id = reg.next_id();
        reg.append(BindingRecord::new(
            id,
            owner,
            DomId(0),
            None,
            "go()",
            Binding::Handler {
                call: HandlerCall::parse("go()").unwrap(),
            },
        ));
        id
    }

    #[test]
    fn ids_are_unique_and_order_is_kept() {
        let mut reg = Registry::new();
        let a = handler(&mut reg, None);
        let b = handler(&mut reg, None);
        assert_ne!(a, b);
        let ids: Vec<_> = reg.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(reg.of_type(DirectiveType::Handler).len(), 2);
    }

    #[test]
    fn pruning_is_scoped_to_the_owner() {
        let mut reg = Registry::new();
        let top = handler(&mut reg, None);
        let owner = RecordId(100);
        handler(&mut reg, Some(owner));
        handler(&mut reg, Some(owner));
        let removed = reg.prune_owner(owner);
        assert_eq!(removed.len(), 2);
        assert_eq!(reg.len(), 1);
        assert!(reg.get(top).is_some());
    }
}
