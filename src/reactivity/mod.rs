// ============================================================================
// spark-bind - Reactivity Module
// Dependency tracking and value equality
// ============================================================================

pub mod equality;
pub mod tracking;

// Re-export main tracking types
pub use tracking::{Dependency, Subscriber, Tracker, TrackingGuard};

// Re-export equality helpers
pub use equality::{list_contains_shallow, shallow_equals, strict_equals};
