// ============================================================================
// spark-bind - Dependency Tracking
// Maps (target, key) observation points to subscriber sets
// ============================================================================
//
// The tracker is owned by the store and handed to every evaluation through
// the proxies that read from it, so "which computed is running" is scoped to
// one store instead of living in ambient global state.
//
// Borrow discipline follows the collect-then-mutate pattern: subscriber lists
// are copied out of their RefCell before any subscriber is called.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::core::types::NodeId;

// =============================================================================
// SUBSCRIBER
// =============================================================================

/// Something that wants to hear about writes to the observation points it read.
///
/// Implemented by [`crate::primitives::computed::ComputedInner`].
pub trait Subscriber {
    /// Invalidate cached state. Must be idempotent.
    fn mark_dirty(&self);

    /// Remember a dependency so the subscriber can detach itself later.
    fn add_dependency(&self, dep: Rc<Dependency>);
}

fn same_subscriber(a: &Weak<dyn Subscriber>, b: &Weak<dyn Subscriber>) -> bool {
    a.as_ptr() as *const () == b.as_ptr() as *const ()
}

// =============================================================================
// DEPENDENCY
// =============================================================================

/// The subscriber set of one `(target, key)` observation point.
pub struct Dependency {
    target: NodeId,
    key: String,
    subscribers: RefCell<Vec<Weak<dyn Subscriber>>>,
}

impl Dependency {
    fn new(target: NodeId, key: &str) -> Self {
        Self {
            target,
            key: key.to_string(),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Add a subscriber unless it is already present.
    pub fn subscribe(&self, subscriber: Weak<dyn Subscriber>) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        if subs.iter().any(|s| same_subscriber(s, &subscriber)) {
            return false;
        }
        subs.push(subscriber);
        true
    }

    pub fn unsubscribe(&self, subscriber: &Weak<dyn Subscriber>) {
        self.subscribers
            .borrow_mut()
            .retain(|s| !same_subscriber(s, subscriber));
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Call every live subscriber's `mark_dirty`.
    pub fn notify(&self) {
        // Clean up dropped subscribers, then release the borrow before calling out
        let live: Vec<Rc<dyn Subscriber>> = {
            let mut subs = self.subscribers.borrow_mut();
            subs.retain(|s| s.strong_count() > 0);
            subs.iter().filter_map(|s| s.upgrade()).collect()
        };

        for subscriber in live {
            subscriber.mark_dirty();
        }
    }
}

// =============================================================================
// TRACKER
// =============================================================================

/// Dependency tracker for one store.
///
/// Only one computed may be mid-evaluation per tracker at a time for the
/// tracking guarantees to hold; nested evaluation restores the outer computed
/// when the inner one finishes but attributes no reads to the outer one.
pub struct Tracker {
    /// Whether writes notify subscribers at all
    enabled: Cell<bool>,

    /// Currently evaluating computed, if any
    active: RefCell<Option<Weak<dyn Subscriber>>>,

    /// target -> key -> dependency
    deps: RefCell<HashMap<NodeId, HashMap<String, Rc<Dependency>>>>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            enabled: Cell::new(true),
            active: RefCell::new(None),
            deps: RefCell::new(HashMap::new()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    // =========================================================================
    // ACTIVE COMPUTED
    // =========================================================================

    /// Make `subscriber` the active evaluation until the guard is dropped.
    pub fn start_tracking(&self, subscriber: Weak<dyn Subscriber>) -> TrackingGuard<'_> {
        let previous = self.active.replace(Some(subscriber));
        TrackingGuard {
            tracker: self,
            previous,
        }
    }

    /// Clear the active evaluation.
    pub fn stop_tracking(&self) {
        self.active.replace(None);
    }

    pub fn is_tracking(&self) -> bool {
        self.active.borrow().is_some()
    }

    // =========================================================================
    // TRACK / NOTIFY
    // =========================================================================

    /// Record a read of `(target, key)` on the active computed, if any.
    pub fn track(&self, target: NodeId, key: &str) {
        let active = match self.active.borrow().as_ref().and_then(|w| w.upgrade()) {
            Some(a) => a,
            None => return,
        };

        let dep = {
            let mut deps = self.deps.borrow_mut();
            deps.entry(target)
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| Rc::new(Dependency::new(target, key)))
                .clone()
        };

        if dep.subscribe(Rc::downgrade(&active)) {
            active.add_dependency(dep);
        }
    }

    /// Mark every subscriber of `(target, key)` dirty. A no-op for points
    /// nobody read.
    pub fn notify(&self, target: NodeId, key: &str) {
        if !self.enabled.get() {
            return;
        }
        let dep = self
            .deps
            .borrow()
            .get(&target)
            .and_then(|keys| keys.get(key))
            .cloned();
        if let Some(dep) = dep {
            dep.notify();
        }
    }

    /// Mark every subscriber of every key of `target` dirty (structural
    /// list changes).
    pub fn notify_all(&self, target: NodeId) {
        if !self.enabled.get() {
            return;
        }
        let deps: Vec<Rc<Dependency>> = self
            .deps
            .borrow()
            .get(&target)
            .map(|keys| keys.values().cloned().collect())
            .unwrap_or_default();
        for dep in deps {
            dep.notify();
        }
    }

    /// Look up an existing dependency.
    pub fn dependency(&self, target: NodeId, key: &str) -> Option<Rc<Dependency>> {
        self.deps.borrow().get(&target).and_then(|keys| keys.get(key)).cloned()
    }
}

/// Restores the previously active computed when dropped.
pub struct TrackingGuard<'a> {
    tracker: &'a Tracker,
    previous: Option<Weak<dyn Subscriber>>,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.tracker.active.replace(self.previous.take());
    }
}

// =============================================================================
// TESTS
// =============================================================================
