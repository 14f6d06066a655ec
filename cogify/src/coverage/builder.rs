//! Quad-tree covering under a tile budget.
//!
//! The covering at a zoom level is every tile whose closed footprint
//! intersects the union of the source extents, in row-major order. The
//! builder scans zoom levels from the finest allowed level towards the root
//! and stops at the first level whose covering fits the budget:
//!
//! ```text
//! zoom = max_zoom ──► tiles ≤ budget? ──yes──► done
//!        ▲                 │
//!        └── zoom - 1 ◄────no
//! ```
//!
//! Zoom 0 holds a single tile, so the scan always terminates.

use tracing::{debug, info};

use super::types::{CoverageError, CoverageResult, CoverageStatus};
use crate::projection::{GeoExtent, QuadKey, TileIndex, TileScheme, MAX_ZOOM};

/// Builds coverings for a tile scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageBuilder {
    scheme: TileScheme,
}

impl CoverageBuilder {
    pub fn new(scheme: TileScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &TileScheme {
        &self.scheme
    }

    /// Computes the finest single-zoom covering of `extents` with at most
    /// `tile_budget` tiles, starting the scan at `max_zoom`.
    ///
    /// # Errors
    ///
    /// - [`CoverageError::InvalidBudget`] if `tile_budget` is zero
    /// - [`CoverageError::InvalidZoom`] if `max_zoom` exceeds [`MAX_ZOOM`]
    /// - [`CoverageError::Validation`] if an extent cannot be projected
    /// - [`CoverageError::Union`] if the union of the extents cannot be tiled
    pub fn build(
        &self,
        extents: &[GeoExtent],
        tile_budget: usize,
        max_zoom: u8,
    ) -> Result<CoverageResult, CoverageError> {
        if tile_budget < 1 {
            return Err(CoverageError::InvalidBudget(tile_budget));
        }
        if max_zoom > MAX_ZOOM {
            return Err(CoverageError::InvalidZoom(max_zoom));
        }

        let projected = extents
            .iter()
            .enumerate()
            .map(|(index, extent)| {
                extent
                    .to_mercator()
                    .map_err(|source| CoverageError::Validation { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(union) = union_of(&projected)? else {
            info!("No source extents supplied, nothing to cover");
            return Ok(CoverageResult::no_input());
        };

        for zoom in (1..=max_zoom).rev() {
            let range = self
                .scheme
                .tile_range(&union, zoom)
                .map_err(CoverageError::Union)?;
            let count = range.count();
            if count <= tile_budget as u64 {
                info!(zoom, tiles = count, tile_budget, "Covering selected");
                let tiles: Vec<TileIndex> = range.tiles().collect();
                return Ok(covered(zoom, &tiles, extents, union));
            }
            debug!(zoom, tiles = count, tile_budget, "Covering exceeds budget, trying coarser zoom");
        }

        // Zoom 0 is the single root tile, which fits any budget of at least one
        info!(zoom = 0, tiles = 1, tile_budget, "Covering selected");
        Ok(covered(0, &[TileIndex::root()], extents, union))
    }
}

fn covered(
    zoom: u8,
    tiles: &[TileIndex],
    extents: &[GeoExtent],
    union: GeoExtent,
) -> CoverageResult {
    CoverageResult {
        zoom,
        tiles: tiles.iter().map(QuadKey::from_tile).collect(),
        source_extents: extents.to_vec(),
        union: Some(union),
        status: CoverageStatus::Covered,
    }
}

/// Bounding box of all extents, `None` when there are none.
fn union_of(extents: &[GeoExtent]) -> Result<Option<GeoExtent>, CoverageError> {
    let mut iter = extents.iter().enumerate();
    let Some((_, first)) = iter.next() else {
        return Ok(None);
    };
    let mut union = *first;
    for (index, extent) in iter {
        union = union
            .union(extent)
            .map_err(|source| CoverageError::Validation { index, source })?;
    }
    Ok(Some(union))
}
