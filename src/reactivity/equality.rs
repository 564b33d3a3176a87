// ============================================================================
// spark-bind - Equality Functions
// Strict and shallow comparison of state values
// ============================================================================

use crate::core::types::{NodeId, Value};
use crate::primitives::store::Store;

// =============================================================================
// STRICT EQUALITY (Default)
// =============================================================================

/// Strict equality: primitives by value, nodes by identity.
///
/// This is the check the proxy layer uses to drop no-op writes.
///
/// # Example
/// ```
/// use spark_bind::reactivity::equality::strict_equals;
/// use spark_bind::Value;
///
/// assert!(strict_equals(&Value::from(1), &Value::from(1)));
/// assert!(!strict_equals(&Value::from(1), &Value::from("1")));
/// ```
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    a == b
}

// =============================================================================
// SHALLOW EQUALITY
// =============================================================================

/// Shallow equality of two nodes: same own-key set, strictly equal values.
///
/// Used to recognise "the same row" of a list when two distinct nodes hold
/// the same data.
pub fn shallow_equals(store: &Store, a: NodeId, b: NodeId) -> bool {
    if a == b {
        return true;
    }
    if store.is_list(a) != store.is_list(b) {
        return false;
    }
    let keys = store.keys(a);
    if keys.len() != store.len(b) {
        return false;
    }
    let b_keys = store.keys(b);
    keys.iter()
        .all(|k| b_keys.contains(k) && store.get(a, k) == store.get(b, k))
}

/// Whether any element of `list` is shallow-equal to `node`.
pub fn list_contains_shallow(store: &Store, list: NodeId, node: NodeId) -> bool {
    store
        .items(list)
        .iter()
        .filter_map(Value::as_node)
        .any(|item| shallow_equals(store, item, node))
}

// =============================================================================
// TESTS
// =============================================================================
