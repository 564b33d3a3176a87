// ============================================================================
// spark-bind - Patch Engine
// Applies one change to the bindings it can affect
// ============================================================================
//
// Passes run in a fixed order, each over its own snapshot of the registry:
//
//   1. conditionals tied to a user computed
//   2. conditionals over synthesized or object-relative expressions
//   3. two-way bindings
//   4. attribute setters (class / src / href)
//   5. text interpolation
//
// A record that has never been applied ("not yet wired") is always applied.
// `None` as the change means "everything" (initial mount).
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::core::types::{Change, ChangeKey, Value};
use crate::dom::{DomId, EventKind, UiTree};
use crate::expression::{split_classes, ExprType};
use crate::reactivity::equality::list_contains_shallow;

use super::linkage::BoundSlot;
use super::record::{
    Binding, BindingRecord, ConditionKind, ConditionSource, DirectiveType, InterpPart, SetterKind,
};
use super::state::{EngineState, MethodCall, Verb};

pub struct Patcher<'a, T: UiTree> {
    state: &'a EngineState,
    tree: &'a mut T,
    change: Option<&'a Change>,
}

impl<'a, T: UiTree> Patcher<'a, T> {
    pub(crate) fn new(state: &'a EngineState, tree: &'a mut T, change: Option<&'a Change>) -> Self {
        Self { state, tree, change }
    }

    /// Run every pass in order.
    pub fn run(mut self) {
        self.conditionals(DirectiveType::Computed);
        self.conditionals(DirectiveType::BooleanExpression);
        self.models();
        self.setters();
        self.interpolations();
    }

    fn snapshot(&self, ty: DirectiveType) -> Vec<Rc<BindingRecord>> {
        self.state.registry.borrow().of_type(ty)
    }

    /// Whether this record must be applied regardless of the change.
    fn fresh(&self, record: &BindingRecord) -> bool {
        self.change.is_none() || !record.is_wired()
    }

    // =========================================================================
    // PASSES 1 + 2: CONDITIONALS
    // =========================================================================

    fn conditionals(&mut self, ty: DirectiveType) {
        let records = self.snapshot(ty);
        trace!(target: "spark_bind::patch", pass = ?ty, records = records.len());
        for record in records {
            let Binding::Conditional { kind, source, anchor } = &record.binding else {
                continue;
            };
            let truthy = match source {
                ConditionSource::Computed(name) | ConditionSource::Synthesized(name) => self
                    .state
                    .computed_value(name)
                    .is_some_and(|v| v.is_truthy()),
                ConditionSource::Object(expr) => {
                    self.state.eval_object_condition(&*self.tree, record.node, expr)
                }
            };
            self.apply_condition(record.node, kind, anchor, truthy);
            record.mark_wired();
        }
    }

    fn apply_condition(
        &mut self,
        el: DomId,
        kind: &ConditionKind,
        anchor: &Cell<Option<DomId>>,
        truthy: bool,
    ) {
        match kind {
            ConditionKind::Hide => self.set_hidden(el, truthy),
            ConditionKind::Show => self.set_hidden(el, !truthy),
            ConditionKind::ClassIf(classes) => {
                for class in classes {
                    if truthy {
                        self.tree.add_class(el, class);
                    } else {
                        self.tree.remove_class(el, class);
                    }
                }
            }
            ConditionKind::If => match (truthy, anchor.get()) {
                (false, None) => {
                    if let Some(parent) = self.tree.parent(el) {
                        let placeholder = self.tree.create_text("");
                        self.tree.insert_before(parent, placeholder, Some(el));
                        self.tree.remove(el);
                        anchor.set(Some(placeholder));
                    }
                }
                (true, Some(placeholder)) => {
                    if let Some(parent) = self.tree.parent(placeholder) {
                        self.tree.insert_before(parent, el, Some(placeholder));
                        self.tree.remove(placeholder);
                    }
                    anchor.set(None);
                }
                _ => {}
            },
        }
    }

    fn set_hidden(&mut self, el: DomId, hidden: bool) {
        let current = self.tree.style(el, "display");
        if hidden && current.as_deref() != Some("none") {
            self.tree.set_style(el, "display", Some("none"));
        } else if !hidden && current.is_some() {
            self.tree.set_style(el, "display", None);
        }
    }

    // =========================================================================
    // MATCHING
    // =========================================================================

    /// Re-resolve the bound slot and decide whether the change reaches it.
    fn matched_slot(&self, record: &BindingRecord, target: &ExprType) -> Option<BoundSlot> {
        let slot = self.state.resolve_slot(&*self.tree, record.node, target)?;
        self.state
            .linkage
            .borrow_mut()
            .set_link(record.id, slot.clone());
        if self.fresh(record) {
            return Some(slot);
        }
        let change = self.change?;
        slot_matches(self.state, &slot, change).then_some(slot)
    }

    // =========================================================================
    // PASS 3: TWO-WAY BINDINGS
    // =========================================================================

    fn models(&mut self) {
        for record in self.snapshot(DirectiveType::Binding) {
            let Binding::Model { target, handler } = &record.binding else {
                continue;
            };
            if !record.is_wired() {
                self.tree.listen(record.node, EventKind::Input);
                self.tree.listen(record.node, EventKind::Change);
            }
            let slot = self.matched_slot(&record, target);
            record.mark_wired();
            let Some(slot) = slot else {
                continue;
            };
            let value = self.state.store.get(slot.node, &slot.key);
            if value.is_null() {
                continue;
            }

            if let Some(name) = handler {
                let Some(method) = self.state.method(name) else {
                    continue;
                };
                let mut call = MethodCall {
                    verb: Verb::SetUi,
                    element: record.node,
                    bound: Value::Node(slot.node),
                    value,
                    args: Vec::new(),
                    root: self.state.root(),
                    ui: Some(&mut *self.tree as &mut dyn UiTree),
                };
                method(&mut call);
                continue;
            }
            self.apply_model(record.node, &value);
        }
    }

    fn apply_model(&mut self, el: DomId, value: &Value) {
        let input_type = self.tree.attribute(el, "type").unwrap_or_default();
        match input_type.as_str() {
            "checkbox" => {
                let checked = value.is_truthy();
                if self.tree.checked(el) != checked {
                    self.tree.set_checked(el, checked);
                }
            }
            "radio" => {
                let checked = self.tree.attribute(el, "value").unwrap_or_default() == value.to_text();
                if self.tree.checked(el) != checked {
                    self.tree.set_checked(el, checked);
                }
            }
            _ => {
                let text = self.state.store.stringify(value);
                if self.tree.value(el) != text {
                    self.tree.set_value(el, &text);
                }
            }
        }
    }

    // =========================================================================
    // PASS 4: ATTRIBUTE SETTERS
    // =========================================================================

    fn setters(&mut self) {
        for record in self.snapshot(DirectiveType::UiSetter) {
            let Binding::Setter { kind, target } = &record.binding else {
                continue;
            };
            let slot = self.matched_slot(&record, target);
            record.mark_wired();
            let Some(slot) = slot else {
                continue;
            };
            let value = self.state.store.get(slot.node, &slot.key);
            if value.is_null() {
                continue;
            }
            let el = record.node;
            match kind {
                SetterKind::Class => {
                    let classes = split_classes(&value.to_text());
                    let previous = self
                        .state
                        .linkage
                        .borrow_mut()
                        .set_classes(record.id, classes.clone());
                    for class in previous.iter().filter(|c| !classes.contains(c)) {
                        self.tree.remove_class(el, class);
                    }
                    for class in &classes {
                        self.tree.add_class(el, class);
                    }
                }
                SetterKind::Src | SetterKind::Href => {
                    let text = value.to_text();
                    if self.tree.attribute(el, kind.attribute()).as_deref() != Some(text.as_str()) {
                        self.tree.set_attribute(el, kind.attribute(), &text);
                    }
                }
            }
        }
    }

    // =========================================================================
    // PASS 5: TEXT INTERPOLATION
    // =========================================================================

    fn interpolations(&mut self) {
        for record in self.snapshot(DirectiveType::UiSetter) {
            let Binding::Interpolation { template, parts } = &record.binding else {
                continue;
            };
            let fresh = self.fresh(&record);
            record.mark_wired();
            if !fresh && !parts.iter().any(|p| self.part_affected(p)) {
                continue;
            }

            let mut text = template.clone();
            let mut substituted = false;
            for part in parts {
                let value = self.state.resolve_value(&*self.tree, record.node, &part.expr);
                text = text.replace(&part.placeholder, &self.state.store.stringify(&value));
                substituted = true;
            }
            if substituted && self.tree.text(record.node) != text {
                self.tree.set_text(record.node, &text);
            }
        }
    }

    /// Root paths are skipped when the written container is not on their
    /// resolution chain; every other expression kind is always re-resolved.
    fn part_affected(&self, part: &InterpPart) -> bool {
        let Some(change) = self.change else {
            return true;
        };
        match &part.expr {
            ExprType::RootPath(path) => {
                let (value, chain) = self.state.resolve_root(path);
                chain.contains(&change.target) || value.as_node() == Some(change.target)
            }
            _ => true,
        }
    }
}

/// Whether `change` reaches the slot a binding reads.
///
/// Same container: the keys must agree (any structural change matches).
/// A write on an ancestor link (e.g. replacing `root.user`) matches. A
/// change on a list matches when any of its rows is shallow-equal to the
/// bound object.
pub(crate) fn slot_matches(state: &EngineState, slot: &BoundSlot, change: &Change) -> bool {
    if change.target == slot.node {
        return match &change.key {
            ChangeKey::Key(key) => key.same_slot(&slot.key),
            ChangeKey::Length | ChangeKey::Mutator(_) => true,
        };
    }
    if slot.chain.contains(&change.target) {
        return true;
    }
    state.store.is_list(change.target) && list_contains_shallow(&state.store, change.target, slot.node)
}
