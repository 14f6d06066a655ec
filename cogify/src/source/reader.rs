//! Source raster metadata.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;

use super::raster::{SourceError, SourceRaster};
use crate::gdal::{info_json, GdalRunner};
use crate::projection::{Epsg, GeoExtent};

/// Reads georeferencing metadata for a source raster.
pub trait MetadataReader: Send + Sync {
    fn read<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<SourceRaster, SourceError>> + Send + 'a>>;
}

/// Metadata reader backed by `gdalinfo -json`.
pub struct GdalInfoReader {
    runner: Arc<dyn GdalRunner>,
}

impl GdalInfoReader {
    pub fn new(runner: Arc<dyn GdalRunner>) -> Self {
        Self { runner }
    }
}

impl MetadataReader for GdalInfoReader {
    fn read<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<SourceRaster, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let command = info_json(path);
            let output = self
                .runner
                .run(&command, None)
                .await
                .map_err(|source| SourceError::Tool {
                    path: path.to_path_buf(),
                    source,
                })?;
            parse_gdalinfo(path, &output.stdout)
        })
    }
}

#[derive(Debug, Deserialize)]
struct GdalInfo {
    size: [u64; 2],
    #[serde(rename = "wgs84Extent")]
    wgs84_extent: Option<Wgs84Extent>,
}

#[derive(Debug, Deserialize)]
struct Wgs84Extent {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<[f64; 2]>>,
}

/// Builds a [`SourceRaster`] from `gdalinfo -json` output.
pub fn parse_gdalinfo(path: &Path, json: &str) -> Result<SourceRaster, SourceError> {
    let invalid = |reason: String| SourceError::InvalidMetadata {
        path: path.to_path_buf(),
        reason,
    };

    let info: GdalInfo = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
    let extent = info
        .wgs84_extent
        .ok_or_else(|| invalid("raster is not georeferenced".to_string()))?;
    if extent.kind != "Polygon" {
        return Err(invalid(format!(
            "unsupported extent geometry '{}'",
            extent.kind
        )));
    }

    let points: Vec<[f64; 2]> = extent.coordinates.into_iter().flatten().collect();
    if points.is_empty() {
        return Err(invalid("extent has no coordinates".to_string()));
    }
    let (min_x, min_y, max_x, max_y) = points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), [x, y]| {
            (min_x.min(*x), min_y.min(*y), max_x.max(*x), max_y.max(*y))
        },
    );
    let extent = GeoExtent::new(min_x, min_y, max_x, max_y, Epsg::Wgs84).map_err(|source| {
        SourceError::Extent {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let [width, height] = info.size;
    if width == 0 || height == 0 {
        return Err(invalid(format!("empty raster {}x{}", width, height)));
    }
    let mercator = extent.to_mercator().map_err(|source| SourceError::Extent {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(SourceRaster {
        path: path.to_path_buf(),
        extent,
        width,
        height,
        resolution: mercator.width() / width as f64,
    })
}
