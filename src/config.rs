//! Compiler configuration.
//!
//! Replaces process-wide logger/state with a value that is passed to
//! [`crate::compile`] explicitly.

use crate::error::{SmqlError, SmqlResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "SMQL_CONFIG";

/// Main SMQL configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SmqlConfig {
    /// Prefix of generated table aliases (`smql_articles`)
    pub alias_prefix: String,

    /// Prefix of generated parameter names (`:p1`)
    pub param_prefix: String,

    /// Longest identifier the target database accepts
    pub max_identifier_len: usize,

    /// Double-quote table and column identifiers
    pub quote_identifiers: bool,

    /// Log every compiled plan at debug level
    pub log_plans: bool,

    /// Database connection URL used by the CLI
    pub database_url: Option<String>,
}

impl Default for SmqlConfig {
    fn default() -> Self {
        Self {
            alias_prefix: "smql".to_string(),
            param_prefix: "p".to_string(),
            max_identifier_len: 63,
            quote_identifiers: false,
            log_plans: false,
            database_url: None,
        }
    }
}

impl SmqlConfig {
    /// Create a new configuration builder
    pub fn builder() -> SmqlConfigBuilder {
        SmqlConfigBuilder::default()
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> SmqlResult<Self> {
        let config: SmqlConfig =
            toml::from_str(input).map_err(|e| SmqlError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SmqlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SmqlError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find the configuration file: `$SMQL_CONFIG`, then
    /// `<config_dir>/smql/config.toml`, then defaults.
    pub fn discover() -> SmqlResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("smql").join("config.toml"))
    }

    fn validate(&self) -> SmqlResult<()> {
        if self.alias_prefix.is_empty() {
            return Err(SmqlError::Config("alias_prefix must not be empty".into()));
        }
        if self.param_prefix.is_empty()
            || !self
                .param_prefix
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return Err(SmqlError::Config(format!(
                "param_prefix '{}' must be a non-empty identifier without digits",
                self.param_prefix
            )));
        }
        // room for the prefix, one separator and a counter suffix
        if self.max_identifier_len < self.alias_prefix.len() + 8 {
            return Err(SmqlError::Config(format!(
                "max_identifier_len {} is too small for alias prefix '{}'",
                self.max_identifier_len, self.alias_prefix
            )));
        }
        Ok(())
    }
}

/// Builder for SmqlConfig
#[derive(Debug, Default)]
pub struct SmqlConfigBuilder {
    config: SmqlConfig,
}

impl SmqlConfigBuilder {
    /// Set the alias prefix
    pub fn alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.alias_prefix = prefix.into();
        self
    }

    /// Set the parameter prefix
    pub fn param_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.param_prefix = prefix.into();
        self
    }

    /// Set the identifier length limit
    pub fn max_identifier_len(mut self, len: usize) -> Self {
        self.config.max_identifier_len = len;
        self
    }

    /// Quote identifiers
    pub fn quote_identifiers(mut self, quote: bool) -> Self {
        self.config.quote_identifiers = quote;
        self
    }

    /// Log compiled plans
    pub fn log_plans(mut self, log: bool) -> Self {
        self.config.log_plans = log;
        self
    }

    /// Set the database URL
    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> SmqlResult<SmqlConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = SmqlConfig::from_toml_str("").unwrap();
        assert_eq!(config, SmqlConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = SmqlConfig::from_toml_str(
            r#"
            alias_prefix = "q"
            quote_identifiers = true
            database_url = "sqlite::memory:"
            "#,
        )
        .unwrap();
        assert_eq!(config.alias_prefix, "q");
        assert!(config.quote_identifiers);
        assert_eq!(config.param_prefix, "p");
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
    }

    #[test]
    fn test_builder_rejects_bad_param_prefix() {
        let err = SmqlConfig::builder().param_prefix("p1").build().unwrap_err();
        assert!(err.to_string().contains("param_prefix"));
    }

    #[test]
    fn test_builder_rejects_tiny_identifier_limit() {
        assert!(SmqlConfig::builder().max_identifier_len(5).build().is_err());
    }
}
