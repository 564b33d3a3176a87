// ============================================================================
// spark-bind - Engine
// Mount, change propagation and user-originated events
// ============================================================================
//
// One propagation cycle per intercepted write:
//
//   1. list templates whose source the write reaches are re-rendered (and
//      any template compiled inside a fresh clone right after)
//   2. the patch passes run over the rest of the registry
//
// A user method may write state while a cycle runs (a bind-handler applying
// a value, a click handler). Such writes are queued and each gets its own
// cycle once the current one finishes, in write order.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::core::config::EngineConfig;
use crate::core::error::{BindError, Result};
use crate::core::types::{Change, Value};
use crate::dom::{Document, DomId, UiTree};
use crate::primitives::{Computed, Proxy, Store};

use super::compiler::Compiler;
use super::patch::Patcher;
use super::record::{Binding, BindingRecord, DirectiveType, ListSource, RecordId};
use super::state::{EngineState, MethodCall, MethodFn, Verb};
use super::template::{RenderOutcome, TemplateRenderer};

// =============================================================================
// APP BUILDER
// =============================================================================

/// Everything needed to mount an engine on a UI tree.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_bind::App;
///
/// let engine = App::from_markup(r#"<p id="hi">Hello {{root.name}}</p>"#)
///     .unwrap()
///     .state(json!({ "name": "Ann" }))
///     .mount()
///     .unwrap();
///
/// let text = engine.with_tree(|doc| doc.text_content(doc.query_id("hi").unwrap()));
/// assert_eq!(text, "Hello Ann");
///
/// engine.root().set("name", "Bob");
/// let text = engine.with_tree(|doc| doc.text_content(doc.query_id("hi").unwrap()));
/// assert_eq!(text, "Hello Bob");
/// ```
pub struct App<T: UiTree + 'static = Document> {
    tree: T,
    root_element: DomId,
    config: EngineConfig,
    state: serde_json::Value,
    methods: Vec<(String, MethodFn)>,
    computed: Vec<Computed>,
    mounted: Option<Box<dyn FnOnce(&Proxy)>>,
}

impl App<Document> {
    /// Bind to the body of an in-memory document.
    pub fn document(doc: Document) -> Self {
        let body = doc.body();
        Self::new(doc, body)
    }

    pub fn from_markup(markup: &str) -> Result<Self> {
        Ok(Self::document(Document::from_markup(markup)?))
    }
}

impl<T: UiTree + 'static> App<T> {
    /// Bind the subtree below `root_element` of `tree`.
    pub fn new(tree: T, root_element: DomId) -> Self {
        Self {
            tree,
            root_element,
            config: EngineConfig::default(),
            state: serde_json::Value::Object(Default::default()),
            methods: Vec::new(),
            computed: Vec::new(),
            mounted: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial application state.
    pub fn state(mut self, state: serde_json::Value) -> Self {
        self.state = state;
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&mut MethodCall<'_>) -> Option<Value> + 'static,
    ) -> Self {
        self.methods.push((name.into(), Rc::new(method)));
        self
    }

    pub fn computed(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&Proxy) -> Value + 'static,
    ) -> Self {
        self.computed.push(Computed::new(name, getter));
        self
    }

    /// Called with the root proxy once the first full patch has run.
    pub fn mounted(mut self, hook: impl FnOnce(&Proxy) + 'static) -> Self {
        self.mounted = Some(Box::new(hook));
        self
    }

    /// Build the store, compile the root subtree and apply every binding.
    ///
    /// Fails on an invalid configuration, or when a list directive has no
    /// loop variable. Any other bad directive is reported and skipped.
    pub fn mount(self) -> Result<Engine<T>> {
        self.config.validate()?;
        let store = Store::from_json(self.state, &self.config.root_alias);
        store.tracker().set_enabled(self.config.track_dependencies);

        let state = EngineState::new(self.config, store);
        {
            let mut computed = state.computed.borrow_mut();
            for c in self.computed {
                computed.insert(c.name().to_string(), c);
            }
        }
        state.methods.borrow_mut().extend(self.methods);

        let inner = Rc::new(EngineInner {
            state,
            tree: RefCell::new(self.tree),
            root_element: self.root_element,
            propagating: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
        });

        let weak: Weak<EngineInner<T>> = Rc::downgrade(&inner);
        inner.state.store.on_change(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.propagate(Some(change.clone()));
            }
        });

        let records = {
            let mut tree = inner.tree.borrow_mut();
            Compiler::new(&inner.state, &mut *tree, None).compile(inner.root_element)?
        };
        inner.propagate(None);
        debug!(
            target: "spark_bind::engine",
            root = %inner.root_element,
            records,
            "mounted"
        );

        if let Some(hook) = self.mounted {
            hook(&inner.state.root());
        }
        Ok(Engine { inner })
    }
}

// =============================================================================
// ENGINE
// =============================================================================

struct EngineInner<T: UiTree> {
    state: EngineState,
    tree: RefCell<T>,
    root_element: DomId,
    propagating: Cell<bool>,
    pending: RefCell<VecDeque<Option<Change>>>,
}

/// Clears the propagating flag even if a cycle panics.
struct PropagationGuard<'a>(&'a Cell<bool>);

impl Drop for PropagationGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: UiTree> EngineInner<T> {
    /// Queue a change and, unless a cycle is already running, drain the queue.
    fn propagate(&self, change: Option<Change>) {
        self.pending.borrow_mut().push_back(change);
        if self.propagating.replace(true) {
            trace!(target: "spark_bind::engine", "change queued behind the running cycle");
            return;
        }
        let _guard = PropagationGuard(&self.propagating);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(change) = next else {
                break;
            };
            self.run_cycle(change.as_ref());
        }
    }

    fn run_cycle(&self, change: Option<&Change>) {
        let state = &self.state;
        let mut tree = self.tree.borrow_mut();

        let templates = state.registry.borrow().of_type(DirectiveType::Template);
        // Computed sources invalidated by this write, before any render reads them
        let dirty: HashSet<RecordId> = templates
            .iter()
            .filter(|r| match r.template().map(|t| &t.source) {
                Some(ListSource::Computed(name)) => {
                    state.computed(name).is_some_and(|c| c.is_dirty())
                }
                _ => false,
            })
            .map(|r| r.id)
            .collect();

        for record in &templates {
            // Pruned by the rebuild of an enclosing template
            if state.registry.borrow().get(record.id).is_none() {
                continue;
            }
            let Some(template) = record.template() else {
                continue;
            };
            let due = match change {
                None => true,
                Some(_) if !record.is_wired() || dirty.contains(&record.id) => true,
                Some(c) => TemplateRenderer::affected_by(
                    state,
                    &*tree,
                    template.anchor,
                    &template.source,
                    c,
                ),
            };
            if due {
                self.render(&mut *tree, record, change);
            }
        }

        // Templates compiled inside fresh clones
        loop {
            let fresh: Vec<_> = state
                .registry
                .borrow()
                .of_type(DirectiveType::Template)
                .into_iter()
                .filter(|r| !r.is_wired())
                .collect();
            if fresh.is_empty() {
                break;
            }
            for record in &fresh {
                self.render(&mut *tree, record, None);
            }
        }

        Patcher::new(state, &mut *tree, change).run();
    }

    fn render(&self, tree: &mut T, record: &BindingRecord, change: Option<&Change>) {
        match TemplateRenderer::new(&self.state, tree).render(record, change) {
            Ok(RenderOutcome::Skipped) => {}
            Ok(outcome) => {
                trace!(target: "spark_bind::engine", record = %record.id, ?outcome, "template rendered");
            }
            Err(err) => self.state.report(err),
        }
    }

    /// First record on `el` or its ancestors that `pick` accepts.
    fn find_record(
        &self,
        el: DomId,
        pick: impl Fn(&BindingRecord) -> bool,
    ) -> Option<Rc<BindingRecord>> {
        let tree = self.tree.borrow();
        let registry = self.state.registry.borrow();
        let mut current = Some(el);
        while let Some(node) = current {
            if let Some(record) = registry.on_node(node).into_iter().find(|r| pick(r.as_ref())) {
                return Some(record);
            }
            current = tree.parent(node);
        }
        None
    }

    /// Write a UI value back through a two-way binding.
    fn write_back(&self, record: &BindingRecord, ui_value: Value) -> bool {
        let Binding::Model { target, handler } = &record.binding else {
            return false;
        };
        let state = &self.state;
        let slot = {
            let tree = self.tree.borrow();
            state.resolve_slot(&*tree, record.node, target)
        };
        let Some(slot) = slot else {
            state.report(BindError::Eval(format!(
                "`{}` does not resolve to a writable slot",
                record.expression
            )));
            return false;
        };

        let value = match handler {
            Some(name) => {
                let Some(method) = state.method(name) else {
                    return false;
                };
                let mut call = MethodCall {
                    verb: Verb::ReadUi,
                    element: record.node,
                    bound: Value::Node(slot.node),
                    value: ui_value,
                    args: Vec::new(),
                    root: state.root(),
                    ui: None,
                };
                match method(&mut call) {
                    Some(value) => value,
                    None => return false,
                }
            }
            None => coerce(&state.store.get(slot.node, &slot.key), ui_value),
        };
        state.store.wrap(slot.node, slot.path).set(slot.key, value)
    }
}

/// Keep numbers numeric when the UI text still parses as one.
fn coerce(current: &Value, ui_value: Value) -> Value {
    if let (Value::Number(_), Some(text)) = (current, ui_value.as_str()) {
        if let Ok(n) = text.trim().parse::<f64>() {
            return Value::Number(n);
        }
    }
    ui_value
}

/// Handle to a mounted engine.
pub struct Engine<T: UiTree + 'static = Document> {
    inner: Rc<EngineInner<T>>,
}

impl<T: UiTree + 'static> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: UiTree + 'static> Engine<T> {
    /// Propagate a change as if it had been intercepted by the store.
    pub fn apply_change(&self, change: &Change) {
        self.inner.propagate(Some(change.clone()));
    }

    /// Re-apply every binding.
    pub fn refresh(&self) {
        self.inner.propagate(None);
    }

    /// Dispatch a click on `el` to the nearest click directive at or above it.
    /// Returns whether a method ran.
    pub fn click(&self, el: DomId) -> bool {
        let inner = &self.inner;
        let Some(record) =
            inner.find_record(el, |r| matches!(r.binding, Binding::Handler { .. }))
        else {
            return false;
        };
        let Binding::Handler { call } = &record.binding else {
            return false;
        };
        let state = &inner.state;
        let Some(method) = state.method(&call.name) else {
            return false;
        };
        let bound = {
            let tree = inner.tree.borrow();
            let linkage = state.linkage.borrow();
            linkage
                .nearest_scope(&*tree, record.node, None)
                .map(|s| s.item.clone())
                .unwrap_or(Value::Node(state.store.root_id()))
        };
        let mut invocation = MethodCall {
            verb: Verb::Click,
            element: record.node,
            bound,
            value: Value::Null,
            args: state.literal_values(&call.args),
            root: state.root(),
            ui: None,
        };
        trace!(target: "spark_bind::engine", method = %call.name, element = %record.node, "click");
        method(&mut invocation);
        true
    }

    /// The user typed `text` into a bound control.
    pub fn input(&self, el: DomId, text: &str) -> bool {
        let Some(record) = self.model_record(el) else {
            return false;
        };
        self.inner.tree.borrow_mut().set_value(el, text);
        self.inner.write_back(&record, Value::from(text))
    }

    /// The user toggled a bound checkbox or radio button.
    pub fn toggle(&self, el: DomId, checked: bool) -> bool {
        let Some(record) = self.model_record(el) else {
            return false;
        };
        let (is_radio, radio_value) = {
            let mut tree = self.inner.tree.borrow_mut();
            tree.set_checked(el, checked);
            (
                tree.attribute(el, "type").as_deref() == Some("radio"),
                tree.attribute(el, "value").unwrap_or_default(),
            )
        };
        if !is_radio {
            return self.inner.write_back(&record, Value::Bool(checked));
        }
        checked && self.inner.write_back(&record, Value::from(radio_value))
    }

    fn model_record(&self, el: DomId) -> Option<Rc<BindingRecord>> {
        self.inner
            .state
            .registry
            .borrow()
            .on_node(el)
            .into_iter()
            .find(|r| matches!(r.binding, Binding::Model { .. }))
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Every distinct error reported since mount, oldest first.
    pub fn diagnostics(&self) -> Vec<BindError> {
        self.inner.state.diagnostics.snapshot()
    }

    pub fn registry_len(&self) -> usize {
        self.inner.state.registry.borrow().len()
    }

    pub fn records(&self, ty: DirectiveType) -> Vec<Rc<BindingRecord>> {
        self.inner.state.registry.borrow().of_type(ty)
    }

    /// Read access to the UI tree.
    ///
    /// # Panics
    ///
    /// Panics if called from a user method while a cycle is patching.
    pub fn with_tree<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.tree.borrow())
    }

    pub fn store(&self) -> Store {
        self.inner.state.store.clone()
    }

    pub fn root(&self) -> Proxy {
        self.inner.state.root()
    }

    /// Current value of a registered computed.
    pub fn computed(&self, name: &str) -> Option<Value> {
        self.inner.state.computed_value(name)
    }

    /// Names of every registered computed, user-declared and synthesized.
    pub fn computed_names(&self) -> Vec<String> {
        self.inner.state.computed.borrow().keys().cloned().collect()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.state.config
    }

    pub fn root_element(&self) -> DomId {
        self.inner.root_element
    }
}
