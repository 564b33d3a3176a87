// ============================================================================
// spark-bind - Constants
// Flag constants for computed state and the directive vocabulary
// ============================================================================

// =============================================================================
// COMPUTED FLAGS
// =============================================================================

/// Computed property (lazy, memoized, dependency-tracked)
pub const COMPUTED: u32 = 1 << 1;

/// Computed synthesized by the directive compiler from a boolean expression
pub const SYNTHESIZED: u32 = 1 << 2;

// =============================================================================
// STATUS FLAGS
// =============================================================================

/// Computed is clean (cached value is current)
pub const CLEAN: u32 = 1 << 10;

/// Computed is dirty (must re-run its getter on next read)
pub const DIRTY: u32 = 1 << 11;

/// Computed is currently running its getter
pub const IS_UPDATING: u32 = 1 << 13;

/// Mask to clear all status bits (CLEAN, DIRTY)
pub const STATUS_MASK: u32 = !(DIRTY | CLEAN);

// =============================================================================
// DIRECTIVE VOCABULARY
// =============================================================================
//
// Directive attribute names are `prefix + suffix`; the prefix comes from
// EngineConfig (default "data-").

/// List rendering: `item in root.items`
pub const DIR_FOR: &str = "for";

/// Two-way binding of a UI control to a state path
pub const DIR_BIND: &str = "bind";

/// Name of a user method that translates UI values for a two-way binding
pub const DIR_BIND_HANDLER: &str = "bind-handler";

/// Click handler: `name(arg, ...)`
pub const DIR_CLICK: &str = "click";

/// Class list taken from a state path
pub const DIR_CLASS: &str = "class";

/// Conditional class list: `cls, cls : condition`
pub const DIR_CLASS_IF: &str = "class-if";

/// Hide the element while the condition holds
pub const DIR_HIDE: &str = "hide";

/// Show the element only while the condition holds
pub const DIR_SHOW: &str = "show";

/// Keep the element in the tree only while the condition holds
pub const DIR_IF: &str = "if";

/// Image source taken from a state path
pub const DIR_SRC: &str = "src";

/// Link target taken from a state path
pub const DIR_HREF: &str = "href";

/// Metadata attribute written on each list clone: loop variable name
pub const META_LOOP_VAR: &str = "loop-var";

/// Metadata attribute written on each list clone: zero-based index
pub const META_LOOP_INDEX: &str = "loop-index";

/// Every directive suffix, in the order they are compiled on one element.
pub const DIRECTIVES: &[&str] = &[
    DIR_FOR,
    DIR_BIND,
    DIR_CLICK,
    DIR_CLASS,
    DIR_CLASS_IF,
    DIR_HIDE,
    DIR_SHOW,
    DIR_IF,
    DIR_SRC,
    DIR_HREF,
];

/// Text interpolation delimiters
pub const INTERP_OPEN: &str = "{{";
pub const INTERP_CLOSE: &str = "}}";

/// Prefix of names given to computeds synthesized from boolean expressions
pub const SYNTH_PREFIX: &str = "__expr_";

// =============================================================================
// TESTS
// =============================================================================
