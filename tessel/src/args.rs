use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tessel_mesh::PipelineConfig;
use tracing::info;

/// Converts the meshes of a glTF file into meshlets and reports the result.
#[derive(Debug, Parser)]
#[command(name = "tessel", version, about)]
pub struct Args {
    /// glTF or GLB file to process
    pub path: PathBuf,

    /// TOML file with pipeline settings; missing keys use the defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum vertices per meshlet (3..=255)
    #[arg(long)]
    pub max_vertices: Option<usize>,

    /// Maximum triangles per meshlet (1..=512, divisible by 4)
    #[arg(long)]
    pub max_triangles: Option<usize>,

    /// Trade packing density (0) against cluster compactness (1)
    #[arg(long)]
    pub cone_weight: Option<f32>,

    /// Modelled post-transform vertex cache size
    #[arg(long)]
    pub cache_size: Option<usize>,

    /// Also compute culling bounds and report how many meshlets have a usable cone
    #[arg(long)]
    pub bounds: bool,
}

impl Args {
    /// Reads the config file, if any, and applies command line overrides.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {:?}", path))?;
                let config: PipelineConfig = toml::from_str(&content)
                    .with_context(|| format!("failed to parse config {:?}", path))?;
                info!("Loaded pipeline config from {:?}", path);
                config
            }
            None => PipelineConfig::default(),
        };

        if let Some(max_vertices) = self.max_vertices {
            config.meshlet.max_vertices = max_vertices;
        }
        if let Some(max_triangles) = self.max_triangles {
            config.meshlet.max_triangles = max_triangles;
        }
        if let Some(cone_weight) = self.cone_weight {
            config.meshlet.cone_weight = cone_weight;
        }
        if let Some(cache_size) = self.cache_size {
            config.vertex_cache_size = cache_size;
        }

        config.validate().context("invalid pipeline config")?;
        Ok(config)
    }
}
