//! Module configuration: compaction threshold and attached-key layout

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RelcountError, Result};

/// Threshold used when nothing else is configured
pub const DEFAULT_COMPACTION_THRESHOLD: usize = 20;

/// Default reserved prefix of every attached key written by this crate
pub const DEFAULT_PREFIX: &str = "_RC_";

/// Default separator between the parts of a serialized shape
pub const DEFAULT_SEPARATOR: &str = "#";

/// Default module instance id
pub const DEFAULT_ID: &str = "relcount";

/// Configuration of one relationship count module instance.
///
/// Several instances with different ids can cache counts on the same vertex;
/// each only ever touches attached keys starting with its own [`key_prefix`].
///
/// [`key_prefix`]: RelcountConfig::key_prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelcountConfig {
    /// Module instance id
    pub id: String,

    /// Reserved prefix shared by all instances
    pub prefix: String,

    /// Separator of type, direction and property parts
    pub separator: String,

    /// Maximum number of distinct cached shapes per (vertex, type, direction)
    pub compaction_threshold: usize,
}

impl Default for RelcountConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_ID.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}

impl RelcountConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.compaction_threshold = threshold;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Load from a JSON document and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject configurations no cache can be built from
    pub fn validate(&self) -> Result<()> {
        if self.compaction_threshold < 1 {
            return Err(RelcountError::InvalidConfig(format!(
                "compaction threshold must be at least 1, got {}",
                self.compaction_threshold
            )));
        }
        if self.separator.is_empty() {
            return Err(RelcountError::InvalidConfig("separator must not be empty".into()));
        }
        if self.prefix.is_empty() {
            return Err(RelcountError::InvalidConfig("prefix must not be empty".into()));
        }
        if self.prefix.contains(&self.separator) || self.id.contains(&self.separator) {
            return Err(RelcountError::InvalidConfig(format!(
                "prefix '{}' and id '{}' must not contain the separator '{}'",
                self.prefix, self.id, self.separator
            )));
        }
        Ok(())
    }

    /// Prefix of every attached key owned by this instance
    pub fn key_prefix(&self) -> String {
        format!("{}{}", self.prefix, self.id)
    }

    /// Attached key of the completeness marker written by the module layer
    pub fn marker_key(&self) -> String {
        format!("{}{}{}", self.prefix, self.id, "_COMPLETE")
    }
}
