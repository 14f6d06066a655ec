//! Environment variable overrides.
//!
//! The lookup function is injected so callers decide where values come
//! from; the binary passes `std::env::var`.

use std::path::PathBuf;

use super::file::parse_bool;
use super::{ConfigError, ConvertConfig};

/// Output directory override.
pub const ENV_OUTPUT_DIR: &str = "COG_BUCKET";
/// Metadata read concurrency.
pub const ENV_TIFF_CONCURRENCY: &str = "TIFF_CONCURRENCY";
/// Single covering tile to convert.
pub const ENV_BATCH_INDEX: &str = "AWS_BATCH_JOB_ARRAY_INDEX";
/// Run GDAL inside docker when truthy.
pub const ENV_GDAL_DOCKER: &str = "GDAL_DOCKER";
pub const ENV_GDAL_DOCKER_CONTAINER: &str = "GDAL_DOCKER_CONTAINER";
pub const ENV_GDAL_DOCKER_CONTAINER_TAG: &str = "GDAL_DOCKER_CONTAINER_TAG";

/// Overlays environment values onto `config`.
///
/// Unset and blank variables are ignored.
pub fn apply_env<F, E>(mut config: ConvertConfig, lookup: F) -> Result<ConvertConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, E>,
{
    let get = |name: &str| {
        lookup(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let invalid = |name: &str, value: String, reason: &str| ConfigError::InvalidValue {
        section: "env".to_string(),
        key: name.to_string(),
        value,
        reason: reason.to_string(),
    };

    if let Some(v) = get(ENV_OUTPUT_DIR) {
        config.output_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = get(ENV_TIFF_CONCURRENCY) {
        config.metadata_concurrency = v
            .parse()
            .map_err(|_| invalid(ENV_TIFF_CONCURRENCY, v.clone(), "expected a job count"))?;
    }
    if let Some(v) = get(ENV_BATCH_INDEX) {
        config.batch_index = Some(
            v.parse()
                .map_err(|_| invalid(ENV_BATCH_INDEX, v.clone(), "expected a tile index"))?,
        );
    }
    if let Some(v) = get(ENV_GDAL_DOCKER) {
        config.gdal.use_docker = parse_bool(&v);
    }
    if let Some(v) = get(ENV_GDAL_DOCKER_CONTAINER) {
        config.gdal.container = v;
    }
    if let Some(v) = get(ENV_GDAL_DOCKER_CONTAINER_TAG) {
        config.gdal.tag = v;
    }

    Ok(config)
}
