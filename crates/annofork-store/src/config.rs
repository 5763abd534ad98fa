//! Engine configuration
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! trajectory_key_fields = ["permalink"]
//! reconcile_batch_size = 10
//! strict_parse = true
//! cache_capacity = 256
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotatorConfig {
    /// Fields that identify a trajectory row across copies
    ///
    /// Reconciliation falls back to row position when any of them is
    /// missing from either table.
    pub trajectory_key_fields: Vec<String>,
    /// Workspace files read ahead per reconcile batch
    pub reconcile_batch_size: usize,
    /// Abort fork/reconcile on any codec diagnostic
    pub strict_parse: bool,
    /// Parsed tables kept in memory
    pub cache_capacity: u64,
}

impl AnnotatorConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With trajectory key fields
    #[inline]
    #[must_use]
    pub fn with_trajectory_key_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trajectory_key_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// With reconcile batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.reconcile_batch_size = size;
        self
    }

    /// With strict parsing on or off
    #[inline]
    #[must_use]
    pub fn with_strict_parse(mut self, strict: bool) -> Self {
        self.strict_parse = strict;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// [`ConfigError::Toml`] for bad syntax or unknown keys,
    /// [`ConfigError::Invalid`] for out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, plus everything
    /// [`AnnotatorConfig::from_toml_str`] reports
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "reconcile_batch_size must be at least 1".to_string(),
            ));
        }
        if self.trajectory_key_fields.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "trajectory_key_fields must not contain empty names".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            trajectory_key_fields: vec!["permalink".to_string()],
            reconcile_batch_size: 10,
            strict_parse: true,
            cache_capacity: 256,
        }
    }
}
