use serde::{Deserialize, Serialize};

use crate::cascade::CascadeMode;
use crate::error::{MapError, MapResult};

/// Configuration for a mapping engine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Cascade mode used by `read_all_blocks_default`.
    pub cascade: CascadeMode,
    /// Whether `read_all_blocks_default` leaves payloads unloaded.
    pub lazy: bool,
    /// Whether a file-backed engine persists pending writes when dropped.
    pub flush_on_drop: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cascade: CascadeMode::Full,
            lazy: false,
            flush_on_drop: true,
        }
    }
}

impl MapperConfig {
    /// Parse from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> MapResult<Self> {
        toml::from_str(s).map_err(|e| MapError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> MapResult<String> {
        toml::to_string(self).map_err(|e| MapError::Config(e.to_string()))
    }
}
