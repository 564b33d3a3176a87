// ============================================================================
// spark-bind - Reactive Data Binding for Rust
// ============================================================================
//
// Keeps a state tree and a UI tree in sync without a virtual DOM:
//
//   state write -> proxy intercept -> dependency invalidation
//               -> registry lookup -> minimal UI patch
//
// The UI tree is a collaborator behind the `UiTree` trait; `dom::Document`
// is the in-memory implementation.
// ============================================================================

pub mod binding;
pub mod core;
pub mod dom;
pub mod expression;
pub mod primitives;
pub mod reactivity;

mod macros;

// Re-export core items at crate root
pub use core::constants;
pub use core::{BindError, Change, ChangeKey, EngineConfig, Key, ListMutator, NodeId, Result, Value};

// State, proxies and computed properties
pub use primitives::{Computed, Proxy, Store};
pub use reactivity::{Dependency, Subscriber, Tracker};

// Expressions
pub use expression::{
    classify, Condition, DirectiveKind, ExprError, ExprType, HandlerCall, Literal, Path,
};

// UI tree
pub use dom::{Document, DomId, EventKind, UiTree};

// Binding engine
pub use binding::{
    App, Binding, BindingRecord, Compiler, DirectiveType, Engine, MethodCall, Patcher, Registry,
    RenderOutcome, TemplateRenderer, Verb,
};

// =============================================================================
// TESTS
// =============================================================================
