// ============================================================================
// spark-bind - Template Renderer
// Clones list templates once per item and compiles each clone
// ============================================================================

use tracing::{debug, trace};

use crate::core::error::{BindError, Result};
use crate::core::types::{Change, ChangeKey, Key, ListMutator, NodeId, Value};
use crate::dom::{DomId, UiTree};

use super::compiler::Compiler;
use super::linkage::LoopScope;
use super::record::{Binding, BindingRecord, ConditionSource, ListSource, TemplateBinding};
use super::state::EngineState;

/// What a render did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Source did not resolve to a list
    Skipped,
    /// Only the newly appended item was rendered
    Appended,
    /// All clones were discarded and rebuilt
    Rebuilt(usize),
}

/// A resolved list source.
pub(crate) struct ResolvedList {
    pub(crate) node: NodeId,
    /// Path items are addressed by
    pub(crate) path: String,
}

pub struct TemplateRenderer<'a, T: UiTree + ?Sized> {
    state: &'a EngineState,
    tree: &'a mut T,
}

impl<'a, T: UiTree + ?Sized> TemplateRenderer<'a, T> {
    pub(crate) fn new(state: &'a EngineState, tree: &'a mut T) -> Self {
        Self { state, tree }
    }

    /// Resolve a template's source to a list node. Object sources are read
    /// from the loop scope enclosing `anchor`.
    pub(crate) fn resolve(
        state: &EngineState,
        tree: &T,
        anchor: DomId,
        source: &ListSource,
    ) -> Option<ResolvedList> {
        let (value, path) = match source {
            ListSource::Root(path) => (state.resolve_root(path).0, path.to_text()),
            ListSource::Computed(name) => (state.computed_value(name)?, name.clone()),
            ListSource::Object(path) => {
                let (item, base) = {
                    let linkage = state.linkage.borrow();
                    let scope = linkage.nearest_scope(tree, anchor, path.head())?;
                    (scope.item.clone(), scope.path.clone())
                };
                let value = state.walk(item, path.tail()).0;
                (value, path.tail().iter().fold(base, |acc, k| k.join(&acc)))
            }
        };
        let node = value.as_node().filter(|&n| state.store.is_list(n))?;
        Some(ResolvedList { node, path })
    }

    /// Whether `change` can affect what a template renders: a write on any
    /// link of the source path, or on the list itself. A computed source
    /// only matches a write on the list it currently yields; invalidation
    /// is detected from its dirty flag.
    pub(crate) fn affected_by(
        state: &EngineState,
        tree: &T,
        anchor: DomId,
        source: &ListSource,
        change: &Change,
    ) -> bool {
        let (mut current, keys) = match source {
            ListSource::Root(path) => (Value::Node(state.store.root_id()), path.tail()),
            ListSource::Object(path) => {
                let linkage = state.linkage.borrow();
                match linkage.nearest_scope(tree, anchor, path.head()) {
                    Some(scope) => (scope.item.clone(), path.tail()),
                    None => return false,
                }
            }
            ListSource::Computed(name) => {
                return state.computed_value(name).and_then(|v| v.as_node()) == Some(change.target);
            }
        };
        for key in keys {
            let Value::Node(node) = current else {
                return false;
            };
            if node == change.target {
                return match &change.key {
                    ChangeKey::Key(k) => k.same_slot(key),
                    _ => true,
                };
            }
            current = state.store.get(node, key);
        }
        current.as_node() == Some(change.target)
    }

    /// Render one template record.
    pub fn render(&mut self, record: &BindingRecord, change: Option<&Change>) -> Result<RenderOutcome> {
        let Some(template) = record.template() else {
            return Ok(RenderOutcome::Skipped);
        };
        record.mark_wired();

        let Some(list) = Self::resolve(self.state, &*self.tree, template.anchor, &template.source)
        else {
            trace!(target: "spark_bind::template", record = %record.id, "source is not a list");
            return Ok(RenderOutcome::Skipped);
        };
        let items = self.state.store.items(list.node);

        let rendered = template.clones.borrow().len();
        let appended = change.is_some_and(|c| {
            c.key == ChangeKey::Mutator(ListMutator::Push) && c.target == list.node
        });
        if self.state.config.fast_append && appended && items.len() == rendered + 1 {
            let index = rendered;
            let clone = self.build_clone(record, template, index, &items[index], &list.path);
            Compiler::new(self.state, &mut *self.tree, Some(record.id)).compile(clone)?;
            self.tree.insert_before(self.anchor_parent(template)?, clone, Some(template.anchor));
            template.clones.borrow_mut().push(clone);
            debug!(target: "spark_bind::template", record = %record.id, index, "appended");
            return Ok(RenderOutcome::Appended);
        }

        self.discard(record, template);

        let mut clones = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let clone = self.build_clone(record, template, index, item, &list.path);
            Compiler::new(self.state, &mut *self.tree, Some(record.id)).compile(clone)?;
            clones.push(clone);
        }
        let parent = self.anchor_parent(template)?;
        self.tree.insert_many(parent, &clones, Some(template.anchor));
        let count = clones.len();
        *template.clones.borrow_mut() = clones;

        debug!(target: "spark_bind::template", record = %record.id, count, "rebuilt");
        Ok(RenderOutcome::Rebuilt(count))
    }

    fn anchor_parent(&self, template: &TemplateBinding) -> Result<DomId> {
        self.tree.parent(template.anchor).ok_or_else(|| {
            BindError::Eval(format!("list anchor {} is detached", template.anchor))
        })
    }

    /// Drop previous clones and every record compiled inside them.
    fn discard(&mut self, record: &BindingRecord, template: &TemplateBinding) {
        let pruned = self.state.registry.borrow_mut().prune_owner(record.id);
        let mut clones = template.clones.take();
        for &clone in &clones {
            self.tree.remove(clone);
        }
        // Nested clones leave with their outer clone; only their scopes remain
        for pruned_record in &pruned {
            if let Some(nested) = pruned_record.template() {
                clones.extend(nested.clones.take());
            }
        }
        for pruned_record in &pruned {
            let Binding::Conditional { source, anchor, .. } = &pruned_record.binding else {
                continue;
            };
            // A clone root removed by its own `if` left a placeholder in the container
            if let Some(placeholder) = anchor.take() {
                self.tree.remove(placeholder);
            }
            if let ConditionSource::Synthesized(name) = source {
                self.state.computed.borrow_mut().shift_remove(name);
            }
        }
        let ids: Vec<_> = pruned.iter().map(|r| r.id).collect();
        self.state.linkage.borrow_mut().forget(&ids, &clones);
    }

    fn build_clone(
        &mut self,
        record: &BindingRecord,
        template: &TemplateBinding,
        index: usize,
        item: &Value,
        list_path: &str,
    ) -> DomId {
        let config = &self.state.config;
        let clone = self.tree.create_element(&template.tag);
        for (name, value) in &template.attrs {
            self.tree.set_attribute(clone, name, value);
        }
        if let Err(err) = self.tree.set_inner_markup(clone, &template.markup) {
            self.state.report(err.into());
        }
        self.tree.set_attribute(clone, &config.loop_var_attr(), &template.var);
        self.tree
            .set_attribute(clone, &config.loop_index_attr(), &index.to_string());

        for node in self.tree.descendants(clone) {
            if let Some(id) = self.tree.attribute(node, "id") {
                self.tree.set_attribute(node, "id", &format!("{}-{}", id, index));
            }
        }

        self.state.linkage.borrow_mut().set_scope(
            clone,
            LoopScope {
                var: template.var.clone(),
                index,
                item: item.clone(),
                path: Key::Index(index).join(list_path),
                template: record.id,
            },
        );
        clone
    }
}
