//! Conversion configuration.
//!
//! [`ConvertConfig`] is built in layers: defaults, then the INI file at
//! `~/.cogify/config.ini`, then environment variables, then command-line
//! flags applied by the caller.
//!
//! # Example
//!
//! ```
//! use cogify::config::ConvertConfig;
//!
//! let config = ConvertConfig::default()
//!     .with_tile_budget(20)
//!     .with_concurrency(8)
//!     .with_commit(true);
//! assert!(!config.dry_run);
//! ```

mod env;
mod file;

pub use env::{
    apply_env, ENV_BATCH_INDEX, ENV_GDAL_DOCKER, ENV_GDAL_DOCKER_CONTAINER,
    ENV_GDAL_DOCKER_CONTAINER_TAG, ENV_OUTPUT_DIR, ENV_TIFF_CONCURRENCY,
};
pub use file::{config_directory, config_file_path, load_config_file, parse_config};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::gdal::GdalConfig;
use crate::projection::DEFAULT_TILE_SIZE;

/// Default maximum number of covering tiles.
pub const DEFAULT_TILE_BUDGET: usize = 50;

/// Default number of tiles converted in parallel.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default number of metadata reads in flight.
pub const DEFAULT_METADATA_CONCURRENCY: usize = 5;

/// Default output file extension.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "tiff";

/// Output directory name created inside the input directory.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "cog";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings for a conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Maximum number of covering tiles.
    pub tile_budget: usize,
    /// Finest zoom to consider; `None` uses the sources' native zoom.
    pub max_zoom: Option<u8>,
    /// Tiles converted in parallel.
    pub concurrency: usize,
    /// Metadata reads in flight during planning.
    pub metadata_concurrency: usize,
    /// Plan and log only; no external process writes anything.
    pub dry_run: bool,
    /// Output directory; defaults to `<input>/cog`.
    pub output_dir: Option<PathBuf>,
    pub output_extension: String,
    /// Where to write the coverage GeoJSON, if anywhere.
    pub geojson_path: Option<PathBuf>,
    /// Convert only the covering tile with this index.
    pub batch_index: Option<usize>,
    pub gdal: GdalConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            tile_budget: DEFAULT_TILE_BUDGET,
            max_zoom: None,
            concurrency: DEFAULT_CONCURRENCY,
            metadata_concurrency: DEFAULT_METADATA_CONCURRENCY,
            dry_run: true,
            output_dir: None,
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            geojson_path: None,
            batch_index: None,
            gdal: GdalConfig::default(),
        }
    }
}

impl ConvertConfig {
    pub fn with_tile_budget(mut self, tile_budget: usize) -> Self {
        self.tile_budget = tile_budget;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: u8) -> Self {
        self.max_zoom = Some(max_zoom);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// `true` runs the external tools; `false` keeps the default dry run.
    pub fn with_commit(mut self, commit: bool) -> Self {
        self.dry_run = !commit;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_geojson_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.geojson_path = Some(path.into());
        self
    }

    pub fn with_batch_index(mut self, index: usize) -> Self {
        self.batch_index = Some(index);
        self
    }

    pub fn with_docker(mut self, use_docker: bool) -> Self {
        self.gdal.use_docker = use_docker;
        self
    }

    /// Output directory for a run over `input_dir`.
    pub fn resolve_output_dir(&self, input_dir: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| input_dir.join(DEFAULT_OUTPUT_DIR_NAME))
    }

    /// Rejects settings no run could use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String, reason: &str| ConfigError::InvalidValue {
            section: "convert".to_string(),
            key: key.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.tile_size == 0 || !self.tile_size.is_power_of_two() {
            return Err(invalid(
                "tile_size",
                self.tile_size.to_string(),
                "must be a power of two",
            ));
        }
        if self.tile_budget == 0 {
            return Err(invalid("tile_budget", "0".to_string(), "must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "0".to_string(), "must be at least 1"));
        }
        if self.metadata_concurrency == 0 {
            return Err(invalid(
                "metadata_concurrency",
                "0".to_string(),
                "must be at least 1",
            ));
        }
        let extension = self.output_extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(invalid(
                "output_extension",
                self.output_extension.clone(),
                "must be a plain file extension",
            ));
        }
        Ok(())
    }
}
