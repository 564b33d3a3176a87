// ============================================================================
// spark-bind - Engine Configuration
// ============================================================================

use serde::Deserialize;

use super::constants::{META_LOOP_INDEX, META_LOOP_VAR};
use super::error::{BindError, Result};

/// Options controlling the directive vocabulary and propagation behavior.
///
/// # Example
///
/// ```
/// use spark_bind::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "prefix": "x-", "root_alias": "app" }"#).unwrap();
/// assert_eq!(config.directive("bind"), "x-bind");
/// assert_eq!(config.root_alias, "app");
/// assert!(config.track_dependencies);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefix shared by every directive attribute
    pub prefix: String,

    /// First path segment denoting the application state root
    pub root_alias: String,

    /// Interpolation keyword resolving to the enclosing loop index
    pub index_keyword: String,

    /// Notify dependency subscribers on writes
    pub track_dependencies: bool,

    /// Render only the new clone after a pure append
    pub fast_append: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: "data-".to_string(),
            root_alias: "root".to_string(),
            index_keyword: "index".to_string(),
            track_dependencies: true,
            fast_append: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| BindError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the aliases are usable as path segments.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(BindError::Config("directive prefix must not be empty".into()));
        }
        for (what, name) in [("root_alias", &self.root_alias), ("index_keyword", &self.index_keyword)] {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            if !valid {
                return Err(BindError::Config(format!("{} `{}` is not an identifier", what, name)));
            }
        }
        Ok(())
    }

    /// Full attribute name of a directive suffix.
    pub fn directive(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    pub fn loop_var_attr(&self) -> String {
        self.directive(META_LOOP_VAR)
    }

    pub fn loop_index_attr(&self) -> String {
        self.directive(META_LOOP_INDEX)
    }

    /// Whether `expr` is a path rooted at the root alias (`root` or `root.x`).
    pub fn is_root_path(&self, expr: &str) -> bool {
        match expr.trim().strip_prefix(self.root_alias.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
            None => false,
        }
    }
}
