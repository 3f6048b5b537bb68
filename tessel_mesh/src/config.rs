use serde::{Deserialize, Serialize};

use crate::{error::MeshletBuildError, meshlet::MeshletConfig, optimize::CACHE_SIZE_MAX};

/// Settings for the whole per-mesh pipeline. Missing keys fall back to the
/// defaults, so an empty TOML table is a valid config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub meshlet: MeshletConfig,
    /// Modelled post-transform cache size, clamped to `3..=16`.
    pub vertex_cache_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            meshlet: MeshletConfig::default(),
            vertex_cache_size: CACHE_SIZE_MAX,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), MeshletBuildError> {
        self.meshlet.validate()
    }
}
