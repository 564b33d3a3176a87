// ============================================================================
// spark-bind - Primitives Module
// State store, reactive proxies and computed properties
// ============================================================================

pub mod computed;
pub mod proxy;
pub mod store;

// Re-export for convenience
pub use computed::{Computed, ComputedFn, ComputedInner};
pub use proxy::Proxy;
pub use store::{ChangeCallback, MutatorFn, NodeData, Store};
