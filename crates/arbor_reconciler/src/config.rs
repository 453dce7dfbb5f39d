//! Root configuration
//!
//! ```toml
//! max_render_retries = 2
//! trace_commits = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`RootConfig::max_render_retries`]
pub const ENV_MAX_RENDER_RETRIES: &str = "ARBOR_MAX_RENDER_RETRIES";
/// Environment variable overriding [`RootConfig::trace_commits`]
pub const ENV_TRACE_COMMITS: &str = "ARBOR_TRACE_COMMITS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Per-root settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    /// How many times a failed render pass restarts before its lane is abandoned
    pub max_render_retries: u32,
    /// Log a summary of every commit at debug level
    pub trace_commits: bool,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            max_render_retries: 1,
            trace_commits: false,
        }
    }
}

impl RootConfig {
    /// Parse from TOML; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `ARBOR_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_MAX_RENDER_RETRIES) {
            self.max_render_retries = value.trim().parse().map_err(|_| ConfigError::Invalid {
                name: ENV_MAX_RENDER_RETRIES,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_TRACE_COMMITS) {
            self.trace_commits = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: ENV_TRACE_COMMITS,
                        value,
                    })
                }
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RootConfig::default();
        assert_eq!(config.max_render_retries, 1);
        assert!(!config.trace_commits);
        assert_eq!(RootConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_parse_partial() {
        let config = RootConfig::from_toml_str("trace_commits = true").unwrap();
        assert!(config.trace_commits);
        assert_eq!(config.max_render_retries, 1);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            RootConfig::from_toml_str("max_render_retries = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RootConfig::load("/nonexistent/arbor.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let config = RootConfig::default()
            .with_overrides(lookup(&[(ENV_MAX_RENDER_RETRIES, "3"), (ENV_TRACE_COMMITS, "yes")]))
            .unwrap();
        assert_eq!(config.max_render_retries, 3);
        assert!(config.trace_commits);
    }

    #[test]
    fn test_invalid_override() {
        let err = RootConfig::default()
            .with_overrides(lookup(&[(ENV_MAX_RENDER_RETRIES, "-1")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for ARBOR_MAX_RENDER_RETRIES: -1");
    }

    #[test]
    fn test_json_snapshot() {
        let json = serde_json::to_value(RootConfig::default()).unwrap();
        assert_eq!(json, serde_json::json!({ "max_render_retries": 1, "trace_commits": false }));
    }
}
