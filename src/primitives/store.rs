// ============================================================================
// spark-bind - State Store
// Arena of raw state nodes, proxy cache and change emission
// ============================================================================
//
// Every object or list in the state tree is a node in one arena and is
// referenced by NodeId. Proxies never own data; they carry a NodeId plus the
// path they were first reached by, and route every read and write through
// the store so that tracking and change callbacks happen in one place.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::core::types::{Change, ChangeKey, Key, ListMutator, NodeId, Value};
use crate::reactivity::equality::strict_equals;
use crate::reactivity::tracking::Tracker;

use super::proxy::{Proxy, ProxyInner};

// =============================================================================
// RAW NODES
// =============================================================================

/// Raw contents of a non-primitive State Node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Object(IndexMap<String, Value>),
    List(Vec<Value>),
}

/// Callback invoked once per intercepted mutation.
pub type ChangeCallback = Rc<dyn Fn(&Change)>;

/// Memoized wrapper around one list mutator of one list.
pub type MutatorFn = Rc<dyn Fn(Vec<Value>) -> Value>;

/// Dependency key used for a property key.
pub(crate) fn dep_key(key: &Key) -> String {
    match key {
        Key::Field(name) => name.clone(),
        Key::Index(i) => i.to_string(),
    }
}

/// Result of running a mutator while the arena is borrowed.
enum Mutated {
    Done(Value),
    Removed(Vec<Value>),
    NeedsSort,
}

/// Dependency key of the `length` pseudo-property.
pub(crate) const LENGTH_KEY: &str = "length";

/// Proxy cache size below which dead entries are never swept.
const PROXY_SWEEP_MIN: usize = 64;

// =============================================================================
// STORE INNER
// =============================================================================

pub(crate) struct StoreInner {
    nodes: RefCell<Vec<NodeData>>,
    root: NodeId,
    root_alias: String,

    /// Proxy cache keyed by node identity (weak so unused proxies can drop)
    proxies: RefCell<HashMap<NodeId, Weak<ProxyInner>>>,
    /// Cache size that triggers the next sweep of dead entries
    sweep_at: Cell<usize>,

    /// Memoized mutator wrappers per (list, mutator)
    mutators: RefCell<HashMap<(NodeId, ListMutator), MutatorFn>>,

    pub(crate) tracker: Tracker,

    on_change: RefCell<Option<ChangeCallback>>,
}

impl StoreInner {
    // =========================================================================
    // RAW ACCESS (untracked)
    // =========================================================================

    pub(crate) fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&NodeData) -> R) -> R {
        let nodes = self.nodes.borrow();
        f(&nodes[node.0])
    }

    pub(crate) fn is_list(&self, node: NodeId) -> bool {
        self.with_node(node, |data| matches!(data, NodeData::List(_)))
    }

    pub(crate) fn raw_get(&self, node: NodeId, key: &Key) -> Value {
        self.with_node(node, |data| match (data, key) {
            (NodeData::Object(map), Key::Field(name)) => map.get(name).cloned().unwrap_or_default(),
            (NodeData::Object(map), Key::Index(i)) => {
                map.get(&i.to_string()).cloned().unwrap_or_default()
            }
            (NodeData::List(items), Key::Index(i)) => items.get(*i).cloned().unwrap_or_default(),
            (NodeData::List(items), Key::Field(name)) if name == LENGTH_KEY => {
                Value::Number(items.len() as f64)
            }
            (NodeData::List(items), Key::Field(name)) => match name.parse::<usize>() {
                Ok(i) => items.get(i).cloned().unwrap_or_default(),
                Err(_) => Value::Null,
            },
        })
    }

    pub(crate) fn raw_len(&self, node: NodeId) -> usize {
        self.with_node(node, |data| match data {
            NodeData::Object(map) => map.len(),
            NodeData::List(items) => items.len(),
        })
    }

    pub(crate) fn alloc(&self, data: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(data);
        NodeId(nodes.len() - 1)
    }

    // =========================================================================
    // PROXY CACHE
    // =========================================================================

    pub(crate) fn wrap(self: &Rc<Self>, node: NodeId, path: String) -> Proxy {
        if let Some(existing) = self.proxies.borrow().get(&node).and_then(|w| w.upgrade()) {
            return Proxy::from_inner(existing);
        }
        let inner = Rc::new(ProxyInner {
            store: self.clone(),
            node,
            path,
        });
        let mut proxies = self.proxies.borrow_mut();
        proxies.insert(node, Rc::downgrade(&inner));
        if proxies.len() >= self.sweep_at.get() {
            proxies.retain(|_, weak| weak.strong_count() > 0);
            self.sweep_at.set((proxies.len() * 2).max(PROXY_SWEEP_MIN));
            trace!(target: "spark_bind::state", live = proxies.len(), "swept proxy cache");
        }
        drop(proxies);
        Proxy::from_inner(inner)
    }

    pub(crate) fn cached_proxies(&self) -> usize {
        self.proxies.borrow().len()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    fn emit(&self, change: Change) {
        // Clone the callback out so it may re-enter the store
        let callback = self.on_change.borrow().clone();
        if let Some(callback) = callback {
            callback(&change);
        }
    }

    /// Assign `value` to `key` of `node`. Returns false for a no-op write.
    pub(crate) fn write(&self, node: NodeId, path: &str, key: Key, value: Value) -> bool {
        if self.is_list(node) {
            if let Key::Field(name) = &key {
                if name == LENGTH_KEY {
                    let len = match value.as_f64() {
                        Some(n) if n >= 0.0 && n.fract() == 0.0 => n as usize,
                        _ => {
                            warn!(target: "spark_bind::state", "ignoring invalid length {:?}", value);
                            return false;
                        }
                    };
                    return self.set_len(node, path, len);
                }
            }
        }

        let key = match (self.is_list(node), key) {
            (true, Key::Field(name)) => match name.parse::<usize>() {
                Ok(i) => Key::Index(i),
                Err(_) => {
                    warn!(target: "spark_bind::state", "ignoring write of field `{}` on a list", name);
                    return false;
                }
            },
            (false, Key::Index(i)) => Key::Field(i.to_string()),
            (_, key) => key,
        };

        let changed = {
            let mut nodes = self.nodes.borrow_mut();
            match (&mut nodes[node.0], &key) {
                (NodeData::Object(map), Key::Field(name)) => {
                    if map.get(name).is_some_and(|current| strict_equals(current, &value)) {
                        false
                    } else {
                        map.insert(name.clone(), value.clone());
                        true
                    }
                }
                (NodeData::List(items), Key::Index(i)) => {
                    if items.get(*i).is_some_and(|current| strict_equals(current, &value)) {
                        false
                    } else {
                        if *i >= items.len() {
                            items.resize(*i + 1, Value::Null);
                        }
                        items[*i] = value.clone();
                        true
                    }
                }
                _ => false,
            }
        };

        if !changed {
            return false;
        }

        trace!(target: "spark_bind::state", node = %node, key = %key, "write");
        self.tracker.notify(node, &dep_key(&key));
        self.emit(Change {
            path: key.join(path),
            value,
            key: ChangeKey::Key(key),
            target: node,
        });
        true
    }

    /// Change the length of a list; a real change is structural.
    pub(crate) fn set_len(&self, node: NodeId, path: &str, len: usize) -> bool {
        let changed = {
            let mut nodes = self.nodes.borrow_mut();
            match &mut nodes[node.0] {
                NodeData::List(items) if items.len() != len => {
                    items.resize(len, Value::Null);
                    true
                }
                _ => false,
            }
        };
        if !changed {
            return false;
        }

        self.tracker.notify(node, LENGTH_KEY);
        self.tracker.notify_all(node);
        self.emit(Change {
            path: path.to_string(),
            value: Value::Number(len as f64),
            key: ChangeKey::Length,
            target: node,
        });
        true
    }

    /// Run a list mutator on the raw list, then notify and emit.
    pub(crate) fn mutate(
        &self,
        node: NodeId,
        path: &str,
        mutator: ListMutator,
        args: Vec<Value>,
    ) -> Value {
        if !self.is_list(node) {
            warn!(target: "spark_bind::state", "`{}` called on an object at {}", mutator.name(), path);
            return Value::Null;
        }

        let outcome = {
            let mut nodes = self.nodes.borrow_mut();
            let NodeData::List(items) = &mut nodes[node.0] else {
                return Value::Null;
            };
            match mutator {
                ListMutator::Push => {
                    items.extend(args);
                    Mutated::Done(Value::Number(items.len() as f64))
                }
                ListMutator::Pop => Mutated::Done(items.pop().unwrap_or_default()),
                ListMutator::Shift => Mutated::Done(if items.is_empty() {
                    Value::Null
                } else {
                    items.remove(0)
                }),
                ListMutator::Unshift => {
                    items.splice(0..0, args);
                    Mutated::Done(Value::Number(items.len() as f64))
                }
                ListMutator::Reverse => {
                    items.reverse();
                    Mutated::Done(Value::Node(node))
                }
                ListMutator::Sort => Mutated::NeedsSort,
                ListMutator::Splice => {
                    let len = items.len() as f64;
                    let mut args = args.into_iter();
                    let start = match args.next().and_then(|v| v.as_f64()) {
                        Some(s) if s < 0.0 => (len + s).max(0.0),
                        Some(s) => s.min(len),
                        None => len,
                    } as usize;
                    let delete = match args.next().and_then(|v| v.as_f64()) {
                        Some(d) => (d.max(0.0) as usize).min(items.len() - start),
                        None => items.len() - start,
                    };
                    Mutated::Removed(items.splice(start..start + delete, args).collect())
                }
            }
        };

        let result = match outcome {
            Mutated::Done(value) => value,
            Mutated::Removed(removed) => Value::Node(self.alloc(NodeData::List(removed))),
            Mutated::NeedsSort => {
                // Sort keys need the arena, so sort a copy outside the borrow
                let mut items = self.with_node(node, |data| match data {
                    NodeData::List(items) => items.clone(),
                    NodeData::Object(_) => Vec::new(),
                });
                items.sort_by_cached_key(|v| self.sort_key(v));
                if let NodeData::List(raw) = &mut self.nodes.borrow_mut()[node.0] {
                    *raw = items;
                }
                Value::Node(node)
            }
        };

        trace!(target: "spark_bind::state", node = %node, mutator = mutator.name(), "mutate");
        self.tracker.notify(node, mutator.name());
        self.tracker.notify_all(node);
        self.emit(Change {
            path: path.to_string(),
            value: Value::Str(mutator.name().to_string()),
            key: ChangeKey::Mutator(mutator),
            target: node,
        });
        result
    }

    /// Default list ordering compares text forms; nulls go last.
    fn sort_key(&self, value: &Value) -> (bool, String) {
        match value {
            Value::Null => (true, String::new()),
            Value::Node(id) if self.is_list(*id) => (false, self.list_text(*id)),
            Value::Node(_) => (false, "[object Object]".to_string()),
            other => (false, other.to_text()),
        }
    }

    fn list_text(&self, node: NodeId) -> String {
        let items = self.with_node(node, |data| match data {
            NodeData::List(items) => items.clone(),
            NodeData::Object(_) => Vec::new(),
        });
        items
            .iter()
            .map(|v| self.sort_key(v).1)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn mutator(self: &Rc<Self>, node: NodeId, path: &str, mutator: ListMutator) -> MutatorFn {
        if let Some(existing) = self.mutators.borrow().get(&(node, mutator)) {
            return existing.clone();
        }
        let store = Rc::downgrade(self);
        let path = path.to_string();
        let wrapper: MutatorFn = Rc::new(move |args| match store.upgrade() {
            Some(store) => store.mutate(node, &path, mutator, args),
            None => Value::Null,
        });
        self.mutators.borrow_mut().insert((node, mutator), wrapper.clone());
        wrapper
    }
}

// =============================================================================
// STORE - The public handle
// =============================================================================

/// Owner of the observed state tree.
///
/// The arena only grows: subtrees replaced by [`Proxy::set_json`] or
/// removed by a mutator stay allocated for the life of the store. Cached
/// proxies are weak and dead entries are swept as the cache grows.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_bind::{Store, Value};
///
/// let store = Store::from_json(json!({ "user": { "name": "Ann" } }), "root");
/// let root = store.root();
/// let user = root.at("user").unwrap();
/// assert_eq!(user.path(), "root.user");
/// assert_eq!(user.get("name"), Value::from("Ann"));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    /// Create a store whose root is an empty object.
    pub fn new(root_alias: &str) -> Self {
        Self::from_json(serde_json::Value::Object(Default::default()), root_alias)
    }

    /// Build the raw arena from a JSON document. A non-object root is wrapped
    /// as `{ "value": ... }`.
    pub fn from_json(json: serde_json::Value, root_alias: &str) -> Self {
        let json = match json {
            serde_json::Value::Object(_) => json,
            other => serde_json::json!({ "value": other }),
        };
        let inner = Rc::new(StoreInner {
            nodes: RefCell::new(Vec::new()),
            root: NodeId(0),
            root_alias: root_alias.to_string(),
            proxies: RefCell::new(HashMap::new()),
            sweep_at: Cell::new(PROXY_SWEEP_MIN),
            mutators: RefCell::new(HashMap::new()),
            tracker: Tracker::new(),
            on_change: RefCell::new(None),
        });
        // Reserve the root slot first so it gets NodeId(0)
        inner.alloc(NodeData::Object(IndexMap::new()));
        let store = Self { inner };
        if let serde_json::Value::Object(map) = json {
            let fields: IndexMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), store.alloc_json(v))).collect();
            store.inner.nodes.borrow_mut()[0] = NodeData::Object(fields);
        }
        store
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<StoreInner> {
        &self.inner
    }

    /// The root proxy (path = root alias).
    pub fn root(&self) -> Proxy {
        self.inner.wrap(self.inner.root, self.inner.root_alias.clone())
    }

    pub fn root_id(&self) -> NodeId {
        self.inner.root
    }

    pub fn root_alias(&self) -> &str {
        &self.inner.root_alias
    }

    /// Proxy for an arbitrary node. The first path a node is wrapped with is
    /// the one reported in its change notifications.
    pub fn wrap(&self, node: NodeId, path: impl Into<String>) -> Proxy {
        self.inner.wrap(node, path.into())
    }

    pub fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    /// Install the single change callback, replacing any previous one.
    pub fn on_change(&self, callback: impl Fn(&Change) + 'static) {
        self.inner.on_change.replace(Some(Rc::new(callback)));
    }

    pub fn clear_on_change(&self) {
        self.inner.on_change.replace(None);
    }

    // =========================================================================
    // UNTRACKED READS
    // =========================================================================

    pub fn is_list(&self, node: NodeId) -> bool {
        self.inner.is_list(node)
    }

    pub fn get(&self, node: NodeId, key: &Key) -> Value {
        self.inner.raw_get(node, key)
    }

    pub fn len(&self, node: NodeId) -> usize {
        self.inner.raw_len(node)
    }

    pub fn is_empty(&self, node: NodeId) -> bool {
        self.len(node) == 0
    }

    /// Elements of a list (empty for objects).
    pub fn items(&self, node: NodeId) -> Vec<Value> {
        self.inner.with_node(node, |data| match data {
            NodeData::List(items) => items.clone(),
            NodeData::Object(_) => Vec::new(),
        })
    }

    /// Own keys of an object, or indices of a list.
    pub fn keys(&self, node: NodeId) -> Vec<Key> {
        self.inner.with_node(node, |data| match data {
            NodeData::Object(map) => map.keys().map(|k| Key::Field(k.clone())).collect(),
            NodeData::List(items) => (0..items.len()).map(Key::Index).collect(),
        })
    }

    /// Follow `keys` from `start` without tracking. Missing links yield null.
    pub fn get_in(&self, start: &Value, keys: &[Key]) -> Value {
        let mut current = start.clone();
        for key in keys {
            current = match current {
                Value::Node(node) => self.get(node, key),
                _ => return Value::Null,
            };
        }
        current
    }

    // =========================================================================
    // JSON
    // =========================================================================

    /// Allocate a JSON document as fresh nodes (primitives stay inline).
    pub fn alloc_json(&self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                let items = items.iter().map(|v| self.alloc_json(v)).collect();
                Value::Node(self.inner.alloc(NodeData::List(items)))
            }
            serde_json::Value::Object(map) => {
                let fields = map.iter().map(|(k, v)| (k.clone(), self.alloc_json(v))).collect();
                Value::Node(self.inner.alloc(NodeData::Object(fields)))
            }
        }
    }

    /// Render a value as JSON. Cycles render as the string `"[Circular]"`.
    pub fn to_json(&self, value: &Value) -> serde_json::Value {
        let mut visiting = HashSet::new();
        self.to_json_inner(value, &mut visiting)
    }

    fn to_json_inner(&self, value: &Value, visiting: &mut HashSet<NodeId>) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::from(*n as i64)
            }
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Node(node) => {
                if !visiting.insert(*node) {
                    return serde_json::Value::String("[Circular]".to_string());
                }
                let data = self.inner.with_node(*node, |d| d.clone());
                let json = match data {
                    NodeData::List(items) => serde_json::Value::Array(
                        items.iter().map(|v| self.to_json_inner(v, visiting)).collect(),
                    ),
                    NodeData::Object(map) => serde_json::Value::Object(
                        map.iter()
                            .map(|(k, v)| (k.clone(), self.to_json_inner(v, visiting)))
                            .collect(),
                    ),
                };
                visiting.remove(node);
                json
            }
        }
    }

    /// Text form used by interpolation: primitives as text, nodes as JSON.
    pub fn stringify(&self, value: &Value) -> String {
        match value {
            Value::Node(_) => self.to_json(value).to_string(),
            other => other.to_text(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn recording(store: &Store) -> Rc<RefCell<Vec<Change>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        store.on_change(move |c| sink.borrow_mut().push(c.clone()));
        log
    }

    #[test]
    fn json_round_trip_preserves_shape() {
        let doc = json!({ "items": [1, "two", { "three": true }], "n": null });
        let store = Store::from_json(doc.clone(), "root");
        assert_eq!(store.to_json(&Value::Node(store.root_id())), doc);
    }

    #[test]
    fn non_object_root_is_wrapped() {
        let store = Store::from_json(json!([1, 2]), "root");
        assert_eq!(store.to_json(&Value::Node(store.root_id())), json!({ "value": [1, 2] }));
    }

    #[test]
    fn same_value_write_is_silent() {
        let store = Store::from_json(json!({ "a": 1 }), "root");
        let log = recording(&store);
        assert!(!store.root().set("a", 1));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn dead_proxies_are_swept_from_the_cache() {
        let items: Vec<_> = (0..200).map(|i| json!({ "n": i })).collect();
        let store = Store::from_json(json!({ "items": items }), "root");
        let list = store.root().at("items").unwrap();
        for i in 0..200usize {
            // Each item proxy drops at the end of the iteration
            assert_eq!(list.at(i).unwrap().get("n"), Value::from(i as f64));
        }
        assert!(store.inner().cached_proxies() < PROXY_SWEEP_MIN * 2);

        let kept = list.at(7usize).unwrap();
        assert!(Proxy::ptr_eq(&kept, &list.at(7usize).unwrap()));
    }

    #[test]
    fn list_write_uses_bracket_path() {
        let store = Store::from_json(json!({ "items": [1, 2] }), "root");
        let log = recording(&store);
        store.root().at("items").unwrap().set(1usize, 5);
        let change = &log.borrow()[0];
        assert_eq!(change.path, "root.items[1]");
        assert_eq!(change.key, ChangeKey::Key(Key::Index(1)));
    }

    #[test]
    fn length_write_is_structural() {
        let store = Store::from_json(json!({ "items": [1, 2, 3] }), "root");
        let log = recording(&store);
        let items = store.root().at("items").unwrap();
        assert!(!items.set("length", 3));
        assert!(items.set("length", 1));
        assert_eq!(store.items(items.node()), vec![Value::from(1)]);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].key, ChangeKey::Length);
        assert_eq!(log.borrow()[0].path, "root.items");
    }

    #[test]
    fn splice_removes_and_inserts() {
        let store = Store::from_json(json!({ "items": ["a", "b", "c", "d"] }), "root");
        let items = store.root().at("items").unwrap();
        let removed = items.splice(1, 2, vec![Value::from("x")]);
        assert_eq!(store.to_json(&removed), json!(["b", "c"]));
        assert_eq!(store.to_json(&Value::Node(items.node())), json!(["a", "x", "d"]));
    }

    #[test]
    fn sort_orders_by_text() {
        let store = Store::from_json(json!({ "items": [10, 9, "b", "a", null] }), "root");
        let items = store.root().at("items").unwrap();
        items.sort();
        assert_eq!(
            store.to_json(&Value::Node(items.node())),
            json!([10, 9, "a", "b", null])
        );
    }

    #[test]
    fn mutator_callback_reports_name_as_value_and_key() {
        let store = Store::from_json(json!({ "items": [] }), "root");
        let log = recording(&store);
        let items = store.root().at("items").unwrap();
        items.push(Value::from(1));
        let change = log.borrow()[0].clone();
        assert_eq!(change.path, "root.items");
        assert_eq!(change.value, Value::from("push"));
        assert_eq!(change.key, ChangeKey::Mutator(ListMutator::Push));
        assert_eq!(change.target, items.node());
    }

    #[test]
    fn cycles_stringify_safely() {
        let store = Store::from_json(json!({ "a": {} }), "root");
        let a = store.root().at("a").unwrap();
        a.set("me", Value::Node(a.node()));
        assert_eq!(store.stringify(&Value::Node(a.node())), r#"{"me":"[Circular]"}"#);
    }
}
