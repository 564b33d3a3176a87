// ============================================================================
// spark-bind - Computed Properties
// Lazy memoized values derived from the state tree
// ============================================================================
//
// A computed runs its getter against the root proxy. Every tracked read made
// during that run subscribes the computed to the (node, key) it touched; any
// later write to one of those points only marks the computed dirty. The value
// is recomputed on the next read (pull-driven), never eagerly.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::core::constants::*;
use crate::core::types::Value;
use crate::reactivity::tracking::{Dependency, Subscriber};

use super::proxy::Proxy;

/// Getter of a computed: a pure function of the state reachable from the root.
pub type ComputedFn = Box<dyn Fn(&Proxy) -> Value>;

// =============================================================================
// COMPUTED INNER
// =============================================================================

pub struct ComputedInner {
    name: String,

    /// COMPUTED | status
    flags: Cell<u32>,

    getter: ComputedFn,

    /// Cached value (None until first evaluation)
    value: RefCell<Option<Value>>,

    /// Observation points read during the last evaluation
    deps: RefCell<Vec<Rc<Dependency>>>,

    /// Number of getter invocations
    evaluations: Cell<u32>,

    self_ref: RefCell<Weak<ComputedInner>>,
}

impl ComputedInner {
    fn weak_subscriber(&self) -> Weak<dyn Subscriber> {
        match self.self_ref.borrow().upgrade() {
            Some(rc) => {
                let rc: Rc<dyn Subscriber> = rc;
                Rc::downgrade(&rc)
            }
            None => Weak::<ComputedInner>::new(),
        }
    }

    fn set_status(&self, status: u32) {
        self.flags.set((self.flags.get() & STATUS_MASK) | status);
    }
}

impl Subscriber for ComputedInner {
    fn mark_dirty(&self) {
        if self.flags.get() & DIRTY == 0 {
            trace!(target: "spark_bind::computed", name = %self.name, "dirty");
        }
        self.set_status(DIRTY);
    }

    fn add_dependency(&self, dep: Rc<Dependency>) {
        self.deps.borrow_mut().push(dep);
    }
}

// =============================================================================
// COMPUTED - The public handle
// =============================================================================

/// A lazily evaluated, memoized, dependency-tracked value.
///
/// A computed that reads itself, directly or through other computeds, is a
/// programming error: the re-entrant read panics instead of recursing.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_bind::{Computed, Store, Value};
///
/// let store = Store::from_json(json!({ "count": 2 }), "root");
/// let doubled = Computed::new("doubled", |root| {
///     Value::from(root.get("count").as_f64().unwrap_or(0.0) * 2.0)
/// });
///
/// assert_eq!(doubled.get(&store.root()), Value::from(4));
/// store.root().set("count", 5);
/// assert!(doubled.is_dirty());
/// assert_eq!(doubled.get(&store.root()), Value::from(10));
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Rc<ComputedInner>,
}

impl Computed {
    /// Create a computed; it starts dirty and evaluates on first read.
    pub fn new(name: impl Into<String>, getter: impl Fn(&Proxy) -> Value + 'static) -> Self {
        Self::with_flags(name.into(), Box::new(getter), COMPUTED)
    }

    /// A computed generated by the directive compiler for a boolean expression.
    pub(crate) fn synthesized(name: String, getter: ComputedFn) -> Self {
        Self::with_flags(name, getter, COMPUTED | SYNTHESIZED)
    }

    fn with_flags(name: String, getter: ComputedFn, kind: u32) -> Self {
        let inner = Rc::new(ComputedInner {
            name,
            flags: Cell::new(kind | DIRTY),
            getter,
            value: RefCell::new(None),
            deps: RefCell::new(Vec::new()),
            evaluations: Cell::new(0),
            self_ref: RefCell::new(Weak::new()),
        });
        *inner.self_ref.borrow_mut() = Rc::downgrade(&inner);
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.flags.get() & DIRTY != 0
    }

    pub fn is_synthesized(&self) -> bool {
        self.inner.flags.get() & SYNTHESIZED != 0
    }

    /// How many times the getter has run.
    pub fn evaluations(&self) -> u32 {
        self.inner.evaluations.get()
    }

    /// Number of observation points read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Force the next read to recompute.
    pub fn invalidate(&self) {
        self.inner.mark_dirty();
    }

    /// Current value, recomputing first if dirty.
    ///
    /// # Panics
    ///
    /// Panics if called while this same computed is evaluating (a cycle).
    pub fn get(&self, root: &Proxy) -> Value {
        if self.is_dirty() {
            self.evaluate(root);
        }
        self.inner.value.borrow().clone().unwrap_or_default()
    }

    fn evaluate(&self, root: &Proxy) {
        let inner = &self.inner;
        if inner.flags.get() & IS_UPDATING != 0 {
            panic!(
                "Computed `{}` depends on itself. Computed properties must not \
                 read their own value, directly or transitively.",
                inner.name
            );
        }

        // Drop subscriptions from the previous run; the getter re-records them
        let me = inner.weak_subscriber();
        for dep in inner.deps.take() {
            dep.unsubscribe(&me);
        }

        inner.flags.set(inner.flags.get() | IS_UPDATING);
        let value = {
            let store = root.store();
            let _guard = store.tracker().start_tracking(me);
            (inner.getter)(root)
        };
        inner.flags.set(inner.flags.get() & !IS_UPDATING);
        inner.evaluations.set(inner.evaluations.get() + 1);

        *inner.value.borrow_mut() = Some(value);
        inner.set_status(CLEAN);
        trace!(target: "spark_bind::computed", name = %inner.name, "evaluated");
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.inner.name)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::store::Store;
    use serde_json::json;
    use std::cell::RefCell;

    fn active_count() -> Computed {
        Computed::new("active_count", |root| {
            let items = root.at("items").expect("items");
            let n = items
                .items()
                .iter()
                .filter(|v| v.is_truthy())
                .count();
            Value::from(n)
        })
    }

    #[test]
    fn starts_dirty_and_memoizes() {
        let store = Store::from_json(json!({ "items": [true, false, true] }), "root");
        let c = active_count();
        assert!(c.is_dirty());
        assert_eq!(c.get(&store.root()), Value::from(2));
        assert_eq!(c.get(&store.root()), Value::from(2));
        assert_eq!(c.evaluations(), 1);
        assert!(!c.is_dirty());
    }

    #[test]
    fn unrelated_writes_keep_cache() {
        let store = Store::from_json(json!({ "items": [true], "other": 1 }), "root");
        let c = active_count();
        c.get(&store.root());
        store.root().set("other", 2);
        assert!(!c.is_dirty());
        c.get(&store.root());
        assert_eq!(c.evaluations(), 1);
    }

    #[test]
    fn tracked_write_recomputes_once() {
        let store = Store::from_json(json!({ "items": [true, false] }), "root");
        let c = active_count();
        c.get(&store.root());
        let items = store.root().at("items").unwrap();
        items.set(1usize, true);
        items.set(0usize, false);
        assert!(c.is_dirty());
        assert_eq!(c.get(&store.root()), Value::from(1));
        assert_eq!(c.get(&store.root()), Value::from(1));
        assert_eq!(c.evaluations(), 2);
    }

    #[test]
    fn mutators_invalidate_length_readers() {
        let store = Store::from_json(json!({ "items": [true] }), "root");
        let c = active_count();
        assert_eq!(c.get(&store.root()), Value::from(1));
        store.root().at("items").unwrap().push(true);
        assert!(c.is_dirty());
        assert_eq!(c.get(&store.root()), Value::from(2));
    }

    #[test]
    fn dependencies_are_rebuilt_each_run() {
        let store = Store::from_json(json!({ "flag": true, "a": 1, "b": 2 }), "root");
        let c = Computed::new("pick", |root| {
            if root.get("flag").is_truthy() { root.get("a") } else { root.get("b") }
        });
        assert_eq!(c.get(&store.root()), Value::from(1));
        store.root().set("flag", false);
        assert_eq!(c.get(&store.root()), Value::from(2));
        // "a" is no longer read, so writing it leaves the cache alone
        store.root().set("a", 10);
        assert!(!c.is_dirty());
    }

    #[test]
    #[should_panic(expected = "depends on itself")]
    fn self_reading_computed_panics() {
        let store = Store::from_json(json!({}), "root");
        let slot: Rc<RefCell<Option<Computed>>> = Rc::new(RefCell::new(None));
        let inner_slot = slot.clone();
        let c = Computed::new("loop", move |root| {
            let me = inner_slot.borrow().clone().unwrap();
            me.get(root)
        });
        *slot.borrow_mut() = Some(c.clone());
        c.get(&store.root());
    }
}
