// ============================================================================
// spark-bind - Core Module
// Fundamental types, constants, configuration and errors
// ============================================================================

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use config::EngineConfig;
pub use constants::*;
pub use error::{BindError, Result};
pub use types::{format_number, Change, ChangeKey, Key, ListMutator, NodeId, Value};
