// ============================================================================
// spark-bind - Engine State
// What the compile, render and patch passes share
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{error, trace, warn};

use crate::core::config::EngineConfig;
use crate::core::constants::SYNTH_PREFIX;
use crate::core::error::BindError;
use crate::core::types::{Key, NodeId, Value};
use crate::dom::{DomId, UiTree};
use crate::expression::ast::Expr;
use crate::expression::{evaluate, Classifier, ExprType, Literal, Path};
use crate::primitives::{Computed, Proxy, Store};

use super::linkage::{BoundSlot, Linkage};
use super::registry::Registry;

// =============================================================================
// USER METHODS
// =============================================================================

/// Why a user method is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// A click directive fired
    Click,
    /// Apply a state value to the UI (bind-handler)
    SetUi,
    /// Translate a UI value into a state value (bind-handler); the returned
    /// value is written back
    ReadUi,
}

/// Arguments passed to a user method.
pub struct MethodCall<'a> {
    pub verb: Verb,
    pub element: DomId,
    /// Nearest bound object (loop item or the bound container)
    pub bound: Value,
    /// Value being applied (`SetUi`) or read from the UI (`ReadUi`)
    pub value: Value,
    /// Parsed literal arguments of a click directive
    pub args: Vec<Value>,
    pub root: Proxy,
    /// UI access while applying (`SetUi` only)
    pub ui: Option<&'a mut dyn UiTree>,
}

pub type MethodFn = Rc<dyn Fn(&mut MethodCall<'_>) -> Option<Value>>;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// The diagnostic channel. Each distinct error is logged and retained once;
/// repeats (an unknown name hit every cycle) are only traced.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    errors: Rc<RefCell<Vec<BindError>>>,
}

impl Diagnostics {
    pub fn report(&self, err: BindError) {
        if self.errors.borrow().contains(&err) {
            trace!(target: "spark_bind::diagnostics", "repeated: {}", err);
            return;
        }
        match &err {
            BindError::Eval(_) => error!(target: "spark_bind::diagnostics", "{}", err),
            _ => warn!(target: "spark_bind::diagnostics", "{}", err),
        }
        self.errors.borrow_mut().push(err);
    }

    pub fn snapshot(&self) -> Vec<BindError> {
        self.errors.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }
}

// =============================================================================
// ENGINE STATE
// =============================================================================

pub(crate) struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) store: Store,
    pub(crate) computed: RefCell<IndexMap<String, Computed>>,
    pub(crate) methods: RefCell<HashMap<String, MethodFn>>,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) linkage: RefCell<Linkage>,
    pub(crate) diagnostics: Diagnostics,
    synth_seq: Cell<usize>,
}

impl EngineState {
    pub(crate) fn new(config: EngineConfig, store: Store) -> Self {
        Self {
            config,
            store,
            computed: RefCell::new(IndexMap::new()),
            methods: RefCell::new(HashMap::new()),
            registry: RefCell::new(Registry::new()),
            linkage: RefCell::new(Linkage::new()),
            diagnostics: Diagnostics::default(),
            synth_seq: Cell::new(0),
        }
    }

    pub(crate) fn report(&self, err: BindError) {
        self.diagnostics.report(err);
    }

    pub(crate) fn classifier(&self) -> Classifier {
        Classifier::new(&self.config).with_computed(self.computed.borrow().keys().cloned())
    }

    pub(crate) fn root(&self) -> Proxy {
        self.store.root()
    }

    // =========================================================================
    // COMPUTED
    // =========================================================================

    pub(crate) fn computed(&self, name: &str) -> Option<Computed> {
        self.computed.borrow().get(name).cloned()
    }

    /// Current value of a named computed; unknown names are reported.
    pub(crate) fn computed_value(&self, name: &str) -> Option<Value> {
        // Clone out first: the getter may read state but never the registry
        match self.computed(name) {
            Some(computed) => Some(computed.get(&self.root())),
            None => {
                self.report(BindError::UnknownComputed(name.to_string()));
                None
            }
        }
    }

    /// Register a computed evaluating a root expression and return its name.
    pub(crate) fn synthesize(&self, expr: Expr) -> String {
        let seq = self.synth_seq.get();
        self.synth_seq.set(seq + 1);
        let name = format!("{}{}", SYNTH_PREFIX, seq);

        let alias = self.config.root_alias.clone();
        let diagnostics = self.diagnostics.clone();
        let getter = Box::new(move |root: &Proxy| {
            let resolve = |path: &Path| {
                if path.head() == Some(alias.as_str()) {
                    root.get_path(path.tail())
                } else {
                    Value::Null
                }
            };
            match evaluate(&expr, &resolve) {
                Ok(value) => Value::Bool(value.is_truthy()),
                Err(err) => {
                    diagnostics.report(err);
                    Value::Bool(false)
                }
            }
        });
        self.computed
            .borrow_mut()
            .insert(name.clone(), Computed::synthesized(name.clone(), getter));
        name
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Follow `keys` from `start`. Returns the value and every container
    /// visited on the way.
    pub(crate) fn walk(&self, start: Value, keys: &[Key]) -> (Value, Vec<NodeId>) {
        let mut chain = Vec::new();
        let mut current = start;
        for key in keys {
            current = match current {
                Value::Node(node) => {
                    chain.push(node);
                    self.store.get(node, key)
                }
                _ => return (Value::Null, chain),
            };
        }
        (current, chain)
    }

    pub(crate) fn resolve_root(&self, path: &Path) -> (Value, Vec<NodeId>) {
        self.walk(Value::Node(self.store.root_id()), path.tail())
    }

    /// Resolve the object and key a bind/setter expression addresses.
    pub(crate) fn resolve_slot<T: UiTree + ?Sized>(
        &self,
        tree: &T,
        node: DomId,
        target: &ExprType,
    ) -> Option<BoundSlot> {
        let (start, base, keys) = match target {
            ExprType::RootPath(path) => (
                Value::Node(self.store.root_id()),
                self.config.root_alias.clone(),
                path.tail(),
            ),
            ExprType::ObjectPath(path) => {
                let linkage = self.linkage.borrow();
                let scope = linkage.nearest_scope(tree, node, path.head())?;
                (scope.item.clone(), scope.path.clone(), path.tail())
            }
            _ => return None,
        };
        let (key, parents) = keys.split_last()?;
        let (container, chain) = self.walk(start, parents);
        let container = container.as_node()?;
        let path = parents.iter().fold(base, |acc, k| k.join(&acc));
        Some(BoundSlot {
            node: container,
            key: key.clone(),
            path,
            chain,
        })
    }

    /// Current value of an interpolation expression for `node`.
    pub(crate) fn resolve_value<T: UiTree + ?Sized>(
        &self,
        tree: &T,
        node: DomId,
        expr: &ExprType,
    ) -> Value {
        match expr {
            ExprType::Index => self.nearest_index(tree, node),
            ExprType::RootPath(path) => self.resolve_root(path).0,
            ExprType::ObjectPath(path) => {
                let item = {
                    let linkage = self.linkage.borrow();
                    linkage
                        .nearest_scope(tree, node, path.head())
                        .map(|s| s.item.clone())
                };
                match item {
                    Some(item) => self.walk(item, path.tail()).0,
                    None => Value::Null,
                }
            }
            ExprType::ObjectRef(name) => self
                .linkage
                .borrow()
                .nearest_scope(tree, node, Some(name.as_str()))
                .map(|s| s.item.clone())
                .unwrap_or_default(),
            ExprType::ComputedRef(name) => self.computed_value(name).unwrap_or_default(),
            ExprType::Handler(_) | ExprType::RootExpr(_) | ExprType::ObjectExpr(_) => Value::Null,
        }
    }

    /// Index metadata of the nearest ancestor clone.
    fn nearest_index<T: UiTree + ?Sized>(&self, tree: &T, node: DomId) -> Value {
        let attr = self.config.loop_index_attr();
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(index) = tree.attribute(n, &attr) {
                return index.parse::<f64>().map(Value::Number).unwrap_or_default();
            }
            current = tree.parent(n);
        }
        Value::Null
    }

    /// Evaluate an object-relative condition against the bound objects
    /// around `node`. Failures are reported and count as false.
    pub(crate) fn eval_object_condition<T: UiTree + ?Sized>(
        &self,
        tree: &T,
        node: DomId,
        expr: &Expr,
    ) -> bool {
        let resolve = |path: &Path| {
            let head = path.head().unwrap_or_default();
            if head == self.config.root_alias {
                return self.resolve_root(path).0;
            }
            if path.is_single() && self.computed(head).is_some() {
                return self.computed_value(head).unwrap_or_default();
            }
            let item = self
                .linkage
                .borrow()
                .nearest_scope(tree, node, Some(head))
                .map(|s| s.item.clone());
            match item {
                Some(item) => self.walk(item, path.tail()).0,
                None => Value::Null,
            }
        };
        match evaluate(expr, &resolve) {
            Ok(value) => value.is_truthy(),
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    /// Turn handler literals into state values (lists become fresh nodes).
    pub(crate) fn literal_values(&self, args: &[Literal]) -> Vec<Value> {
        args.iter()
            .map(|lit| match lit.to_value() {
                Some(value) => value,
                None => self.store.alloc_json(&lit.to_json()),
            })
            .collect()
    }

    pub(crate) fn method(&self, name: &str) -> Option<MethodFn> {
        let method = self.methods.borrow().get(name).cloned();
        if method.is_none() {
            self.report(BindError::UnknownMethod(name.to_string()));
        }
        method
    }
}
