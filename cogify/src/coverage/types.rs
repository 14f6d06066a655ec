//! Coverage types and errors

use thiserror::Error;

use crate::projection::{GeoExtent, ProjectionError, QuadKey, TileIndex};

/// Whether a covering was produced from real input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStatus {
    /// At least one extent was covered.
    Covered,
    /// No extents were supplied; the tile list is empty.
    NoInput,
}

/// Tiles at a single zoom level covering a set of source extents.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageResult {
    /// Zoom level of every tile in `tiles`.
    pub zoom: u8,
    /// Covering tiles in discovery (row-major) order, without duplicates.
    pub tiles: Vec<QuadKey>,
    /// Source extents as supplied by the caller.
    pub source_extents: Vec<GeoExtent>,
    /// Bounding box of all sources in pseudo-Mercator meters.
    pub union: Option<GeoExtent>,
    pub status: CoverageStatus,
}

impl CoverageResult {
    /// Result for an empty input list.
    pub fn no_input() -> Self {
        Self {
            zoom: 0,
            tiles: Vec::new(),
            source_extents: Vec::new(),
            union: None,
            status: CoverageStatus::NoInput,
        }
    }

    pub fn is_no_input(&self) -> bool {
        self.status == CoverageStatus::NoInput
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tile indices in covering order.
    pub fn tile_indices(&self) -> impl Iterator<Item = TileIndex> + '_ {
        self.tiles.iter().map(QuadKey::to_tile)
    }
}

/// Errors that can occur while building a covering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoverageError {
    /// The tile budget must allow at least one tile
    #[error("Invalid tile budget: {0} (must be at least 1)")]
    InvalidBudget(usize),

    /// The starting zoom level is deeper than the pyramid allows
    #[error("Invalid maximum zoom: {0}")]
    InvalidZoom(u8),

    /// A source extent could not be used
    #[error("Invalid source extent #{index}: {source}")]
    Validation {
        index: usize,
        #[source]
        source: ProjectionError,
    },

    /// The union of the source extents could not be tiled
    #[error("Invalid source union: {0}")]
    Union(#[source] ProjectionError),
}
