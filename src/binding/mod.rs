// ============================================================================
// spark-bind - Binding Module
// Directive compiler, binding registry, list templates and the patch engine
// ============================================================================

pub mod compiler;
pub mod engine;
pub mod linkage;
pub mod patch;
pub mod record;
pub mod registry;
pub mod state;
pub mod template;

pub use compiler::{placeholders, Compiler};
pub use engine::{App, Engine};
pub use linkage::{BoundSlot, Linkage, LoopScope};
pub use patch::Patcher;
pub use record::{
    Binding, BindingRecord, ConditionKind, ConditionSource, DirectiveType, InterpPart, ListSource,
    RecordId, SetterKind, TemplateBinding,
};
pub use registry::Registry;
pub use state::{Diagnostics, MethodCall, MethodFn, Verb};
pub use template::{RenderOutcome, TemplateRenderer};
