//! Runtime configuration

use serde::Deserialize;

use crate::error::ConfigError;

/// Default limit on nested dispatch
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Runtime configuration
///
/// ```ignore
/// let config = RuntimeConfig::from_json_str(r#"{ "max_call_depth": 64 }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Emit a warning when a hook reads the return value or raised error
    /// before the wrapped call has finished
    pub warn_on_early_access: bool,
    /// Maximum number of nested dispatches before `StackOverflow`
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            warn_on_early_access: true,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
