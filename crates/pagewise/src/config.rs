//! Collection configuration.
//!
//! [`CollectionConfig`] carries the tunables shared by every collection
//! strategy. It can be built in code or loaded from TOML:
//!
//! ```
//! use pagewise::config::{CollectionConfig, PageIndexPolicy};
//!
//! let config = CollectionConfig::from_toml_str(r#"
//! page_size = 25
//! block_size = 50
//! max_cached_blocks = 8
//! page_index_policy = "reject"
//! "#).unwrap();
//!
//! assert_eq!(config.page_size, 25);
//! assert_eq!(config.page_index_policy, PageIndexPolicy::Reject);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::selection::SelectMode;

/// What `set_page_idx` does with an index past the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageIndexPolicy {
    /// Move to the last valid page.
    #[default]
    Clamp,
    /// Fail with [`Error::PageOutOfRange`].
    Reject,
}

/// Which item survives when a multi-item selection is coerced into single mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleModeCoercion {
    /// Keep the most recently selected item.
    #[default]
    KeepLast,
    /// Keep the earliest selected item.
    KeepFirst,
    /// Drop the whole selection.
    Clear,
}

/// Tunables for a pageable collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Number of items per page.
    pub page_size: usize,
    /// Number of items fetched per request when a selection is iterated.
    pub block_size: usize,
    /// Upper bound on blocks kept by the page-query cache. `None` is unbounded.
    pub max_cached_blocks: Option<usize>,
    /// Handling of out-of-range page indices.
    pub page_index_policy: PageIndexPolicy,
    /// Mode the selection handler starts in. `Default` resolves to single selection.
    pub default_select_mode: SelectMode,
    /// Behaviour when switching to single selection with several items selected.
    pub single_mode_coercion: SingleModeCoercion,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            block_size: 20,
            max_cached_blocks: None,
            page_index_policy: PageIndexPolicy::Clamp,
            default_select_mode: SelectMode::Single,
            single_mode_coercion: SingleModeCoercion::KeepLast,
        }
    }
}

impl CollectionConfig {
    /// Parse and validate a configuration from a TOML string.
    ///
    /// Missing keys take their default values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Serialize this configuration as pretty-printed TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the selection iteration block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Bound the number of cached blocks.
    pub fn with_max_cached_blocks(mut self, max: usize) -> Self {
        self.max_cached_blocks = Some(max);
        self
    }

    /// Set the page index policy.
    pub fn with_page_index_policy(mut self, policy: PageIndexPolicy) -> Self {
        self.page_index_policy = policy;
        self
    }

    /// Set the initial selection mode.
    pub fn with_select_mode(mut self, mode: SelectMode) -> Self {
        self.default_select_mode = mode;
        self
    }

    /// Set the single mode coercion rule.
    pub fn with_single_mode_coercion(mut self, coercion: SingleModeCoercion) -> Self {
        self.single_mode_coercion = coercion;
        self
    }

    /// Check the configuration for values no collection can work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be at least 1".into()));
        }
        if self.max_cached_blocks == Some(0) {
            return Err(Error::Config("max_cached_blocks must be at least 1".into()));
        }
        Ok(())
    }
}
