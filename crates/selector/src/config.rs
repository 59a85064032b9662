//! Compiler configuration.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::types::{PageId, TotalStrategy};

/// Settings shared by every compile call of a [`crate::SelectorCompiler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Deepest allowed sub-selector nesting. Exceeding it is a syntax error.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Strategy used when compile options don't pick one.
    #[serde(default)]
    pub default_total_strategy: TotalStrategy,

    /// Id of the home page; top-level path segments are its children.
    #[serde(default = "default_root_page_id")]
    pub root_page_id: PageId,

    /// Narrow sub-selectors on relation fields to the field's template and
    /// parent scope when they don't name one themselves.
    #[serde(default = "default_true")]
    pub sub_selector_scope: bool,

    /// Append `pages.id ASC` as the last sort key for stable pagination.
    #[serde(default = "default_true")]
    pub tie_break_by_id: bool,
}

fn default_max_nesting_depth() -> usize {
    4
}

fn default_root_page_id() -> PageId {
    1
}

fn default_true() -> bool {
    true
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: default_max_nesting_depth(),
            default_total_strategy: TotalStrategy::default(),
            root_page_id: default_root_page_id(),
            sub_selector_scope: true,
            tie_break_by_id: true,
        }
    }
}

impl CompilerConfig {
    /// Loads configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(json).map_err(|e| SchemaError::InvalidDocument {
            message: e.to_string(),
        })
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Sets the default total strategy.
    pub fn with_total_strategy(mut self, strategy: TotalStrategy) -> Self {
        self.default_total_strategy = strategy;
        self
    }
}

/// Serde helpers for `Duration` fields written as `"30s"` or `"1m 30s"`.
#[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
