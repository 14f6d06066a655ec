//! Planned conversion work.

use std::path::{Path, PathBuf};

use crate::coverage::CoverageResult;
use crate::gdal::{build_vrt, translate_cog, warp_vrt, GdalCommand, TranslateOptions};
use crate::projection::{GeoExtent, PixelBounds, ProjectionError, QuadKey, TileIndex, TileScheme};

/// File name of the source mosaic inside the input directory.
pub const MOSAIC_FILE_NAME: &str = ".vrt";

/// File name of the warped mosaic inside the input directory.
pub const WARPED_MOSAIC_FILE_NAME: &str = ".epsg3857.vrt";

/// Run-level virtual rasters shared by every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MosaicPaths {
    /// Mosaic of all sources in their native projection.
    pub vrt: PathBuf,
    /// The mosaic warped to pseudo-Mercator; input of every job.
    pub warped: PathBuf,
}

impl MosaicPaths {
    pub fn new(input_dir: &Path) -> Self {
        Self {
            vrt: input_dir.join(MOSAIC_FILE_NAME),
            warped: input_dir.join(WARPED_MOSAIC_FILE_NAME),
        }
    }

    /// Commands that build the mosaic, in execution order.
    pub fn commands(&self, sources: &[PathBuf]) -> [GdalCommand; 2] {
        [build_vrt(&self.vrt, sources), warp_vrt(&self.vrt, &self.warped)]
    }
}

/// One covering tile to extract as a cloud-optimized GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    /// Position in the covering.
    pub index: usize,
    pub quad_key: QuadKey,
    pub tile: TileIndex,
    /// Tile footprint in pseudo-Mercator meters.
    pub clip: GeoExtent,
    /// Tile footprint in pixels at the source zoom.
    pub pixels: PixelBounds,
    /// Overview levels aligned to the tile grid.
    pub alignment_levels: u8,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl ConversionJob {
    /// File written while the tool runs; renamed to `output` on success.
    pub fn temp_output(&self) -> PathBuf {
        let stem = self.quad_key.file_stem();
        let name = match self.output.extension() {
            Some(ext) => format!("{}.tmp.{}", stem, ext.to_string_lossy()),
            None => format!("{}.tmp", stem),
        };
        self.output.with_file_name(name)
    }

    /// `gdal_translate` invocation writing to the temporary output.
    pub fn command(&self, tile_size: u32) -> GdalCommand {
        let temp = self.temp_output();
        translate_cog(&TranslateOptions {
            input: &self.input,
            output: &temp,
            clip: &self.clip,
            tile_size,
            aligned_levels: self.alignment_levels,
        })
    }
}

/// Inputs for turning a covering into jobs.
#[derive(Debug, Clone, Copy)]
pub struct JobPlan<'a> {
    pub scheme: &'a TileScheme,
    pub coverage: &'a CoverageResult,
    /// Zoom matching the sources' native resolution.
    pub source_zoom: u8,
    pub mosaic: &'a Path,
    pub output_dir: &'a Path,
    pub extension: &'a str,
}

/// Builds one job per covering tile, in covering order.
pub fn plan_jobs(plan: &JobPlan<'_>) -> Result<Vec<ConversionJob>, ProjectionError> {
    let alignment_levels = plan.source_zoom.saturating_sub(plan.coverage.zoom);
    let extension = plan.extension.trim_start_matches('.');

    plan.coverage
        .tiles
        .iter()
        .enumerate()
        .map(|(index, quad_key)| {
            let tile = quad_key.to_tile();
            let clip = plan.scheme.tile_bounds_meters(&tile)?;
            let pixels = plan
                .scheme
                .pixel_bounds_from_extent(&clip, plan.source_zoom.max(tile.zoom))?;
            Ok(ConversionJob {
                index,
                quad_key: quad_key.clone(),
                tile,
                clip,
                pixels,
                alignment_levels,
                input: plan.mosaic.to_path_buf(),
                output: plan
                    .output_dir
                    .join(format!("{}.{}", quad_key.file_stem(), extension)),
            })
        })
        .collect()
}
