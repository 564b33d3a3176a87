// ============================================================================
// spark-bind - Reactive Proxy
// Instrumented handle over one State Node
// ============================================================================
//
// A Proxy is the explicit wrapper for one object or list of the state tree:
//
// - reads record a dependency on (node, key) when a computed is evaluating
// - nested objects and lists come back as proxies, memoized by node identity
// - writes skip no-op assignments, notify the tracker and emit one Change
// - list mutators run on the raw list and emit a structural Change
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::core::types::{Key, ListMutator, NodeId, Value};

use super::store::{dep_key, MutatorFn, Store, StoreInner, LENGTH_KEY};

pub(crate) struct ProxyInner {
    pub(crate) store: Rc<StoreInner>,
    pub(crate) node: NodeId,
    pub(crate) path: String,
}

/// Reactive handle over one object or list of a [`Store`].
///
/// Reading the same raw node twice, by any path, yields the same proxy
/// instance for as long as one handle to it is alive:
///
/// ```
/// use serde_json::json;
/// use spark_bind::{Proxy, Store, Value};
///
/// let store = Store::from_json(json!({ "a": { "b": 1 } }), "root");
/// let root = store.root();
/// let a = root.at("a").unwrap();
/// root.set("alias", Value::Node(a.node()));
/// assert!(Proxy::ptr_eq(&a, &root.at("alias").unwrap()));
/// ```
#[derive(Clone)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

impl Proxy {
    pub(crate) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self { inner }
    }

    /// Reference identity of two proxies.
    pub fn ptr_eq(a: &Proxy, b: &Proxy) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// Path this node was first reached by.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn store(&self) -> Store {
        Store::from_inner(self.inner.store.clone())
    }

    pub fn is_list(&self) -> bool {
        self.inner.store.is_list(self.inner.node)
    }

    fn track(&self, key: &str) {
        self.inner.store.tracker.track(self.inner.node, key);
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Read one key, recording a dependency if a computed is evaluating.
    ///
    /// Nested objects come back as [`Value::Node`]; use [`Proxy::at`] to get
    /// a proxy for them.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        self.track(&dep_key(&key));
        self.inner.store.raw_get(self.inner.node, &key)
    }

    /// Read a nested object or list as a proxy (None for primitives).
    pub fn at(&self, key: impl Into<Key>) -> Option<Proxy> {
        let key = key.into();
        let child = self.get(key.clone()).as_node()?;
        let path = if self.is_list() {
            match &key {
                Key::Field(name) => match name.parse::<usize>() {
                    Ok(i) => Key::Index(i).join(self.path()),
                    Err(_) => key.join(self.path()),
                },
                Key::Index(_) => key.join(self.path()),
            }
        } else {
            key.join(self.path())
        };
        Some(self.inner.store.wrap(child, path))
    }

    /// Follow several keys, tracking every step.
    pub fn get_path(&self, keys: &[Key]) -> Value {
        let Some((last, parents)) = keys.split_last() else {
            return Value::Node(self.node());
        };
        let mut current = self.clone();
        for key in parents {
            match current.at(key.clone()) {
                Some(next) => current = next,
                None => return Value::Null,
            }
        }
        current.get(last.clone())
    }

    /// Number of elements (lists) or fields (objects); tracks `length`.
    pub fn len(&self) -> usize {
        self.track(LENGTH_KEY);
        self.inner.store.raw_len(self.inner.node)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All elements of a list, tracking the length and every index.
    pub fn items(&self) -> Vec<Value> {
        let len = self.len();
        (0..len).map(|i| self.get(i)).collect()
    }

    /// Own keys, untracked.
    pub fn keys(&self) -> Vec<Key> {
        self.store().keys(self.inner.node)
    }

    /// Render this node as JSON (untracked).
    pub fn to_json(&self) -> serde_json::Value {
        self.store().to_json(&Value::Node(self.inner.node))
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Assign a value. Setting a value to itself is a no-op and returns false.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        self.inner
            .store
            .write(self.inner.node, &self.inner.path, key.into(), value.into())
    }

    /// Assign a freshly allocated JSON subtree.
    pub fn set_json(&self, key: impl Into<Key>, json: serde_json::Value) -> bool {
        let value = self.store().alloc_json(&json);
        self.set(key, value)
    }

    /// Write the `length` pseudo-property of a list.
    pub fn set_len(&self, len: usize) -> bool {
        self.inner.store.set_len(self.inner.node, &self.inner.path, len)
    }

    // =========================================================================
    // LIST MUTATORS
    // =========================================================================

    /// The memoized wrapper for one mutator of this list.
    pub fn mutator(&self, mutator: ListMutator) -> MutatorFn {
        self.inner.store.mutator(self.inner.node, &self.inner.path, mutator)
    }

    /// Append values; returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Value {
        (self.mutator(ListMutator::Push))(vec![value.into()])
    }

    pub fn pop(&self) -> Value {
        (self.mutator(ListMutator::Pop))(Vec::new())
    }

    pub fn shift(&self) -> Value {
        (self.mutator(ListMutator::Shift))(Vec::new())
    }

    pub fn unshift(&self, value: impl Into<Value>) -> Value {
        (self.mutator(ListMutator::Unshift))(vec![value.into()])
    }

    /// Remove `delete` elements at `start` (negative counts from the end) and
    /// insert `items`; returns the removed elements as a new list.
    pub fn splice(&self, start: i64, delete: usize, items: Vec<Value>) -> Value {
        let mut args = vec![Value::Number(start as f64), Value::Number(delete as f64)];
        args.extend(items);
        (self.mutator(ListMutator::Splice))(args)
    }

    pub fn sort(&self) -> Value {
        (self.mutator(ListMutator::Sort))(Vec::new())
    }

    pub fn reverse(&self) -> Value {
        (self.mutator(ListMutator::Reverse))(Vec::new())
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("node", &self.inner.node)
            .field("path", &self.inner.path)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
