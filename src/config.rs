//! Manager configuration.

use serde::{Deserialize, Serialize};

/// Construction-time settings for a [`crate::CharacterManager`].
///
/// Changing a value means building a new manager.
///
/// # JSON Format
///
/// ```json
/// {
///   "cacheKilobytes": 32768,
///   "recipeCapacity": 4096,
///   "statsIntervalSecs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    /// Memory budget of the rendered-frame cache, in kilobytes.
    pub cache_kilobytes: usize,

    /// Maximum number of recipes kept. `None` keeps every recipe built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_capacity: Option<usize>,

    /// Minimum seconds between cache statistics log lines.
    pub stats_interval_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_kilobytes: 32 * 1024,
            recipe_capacity: None,
            stats_interval_secs: 30,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_kilobytes(mut self, kilobytes: usize) -> Self {
        self.cache_kilobytes = kilobytes;
        self
    }

    pub fn with_recipe_capacity(mut self, capacity: usize) -> Self {
        self.recipe_capacity = Some(capacity);
        self
    }

    pub fn with_stats_interval_secs(mut self, secs: u64) -> Self {
        self.stats_interval_secs = secs;
        self
    }

    /// Pixel cache budget in bytes.
    pub fn cache_budget_bytes(&self) -> usize {
        self.cache_kilobytes.saturating_mul(1024)
    }

    /// Recipe cache budget in entries.
    pub(crate) fn recipe_budget(&self) -> usize {
        self.recipe_capacity.unwrap_or(usize::MAX)
    }

    /// Serializes the configuration to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a configuration from a JSON string.
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
