//! Projection type definitions

use thiserror::Error;

/// Radius of the pseudo-Mercator sphere in meters (EPSG:3857).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Half the circumference of the pseudo-Mercator sphere.
///
/// Projected meters run from `-ORIGIN_SHIFT` to `ORIGIN_SHIFT` on both axes.
pub const ORIGIN_SHIFT: f64 = std::f64::consts::PI * EARTH_RADIUS;

/// Web Mercator valid latitude range
pub const MAX_LAT: f64 = 85.0511287798066;
pub const MIN_LAT: f64 = -MAX_LAT;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Deepest zoom level a tile index or quad key may address.
///
/// Keeps `2^zoom` inside `u32` tile indices.
pub const MAX_ZOOM: u8 = 30;

/// Tile size used when none is configured.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Tile index in the Google/XYZ scheme.
///
/// `y` counts from the northern edge of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    /// X coordinate (west to east)
    pub x: u32,
    /// Y coordinate (north to south)
    pub y: u32,
    /// Zoom level (0-30)
    pub zoom: u8,
}

impl TileIndex {
    /// Creates a tile index, rejecting coordinates outside `0..2^zoom`.
    pub fn new(x: u32, y: u32, zoom: u8) -> Result<Self, ProjectionError> {
        if zoom > MAX_ZOOM {
            return Err(ProjectionError::InvalidZoom(zoom as i64));
        }
        let n = tiles_per_axis(zoom);
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(ProjectionError::TileOutOfRange { x, y, zoom });
        }
        Ok(Self { x, y, zoom })
    }

    /// The single tile at zoom 0.
    pub const fn root() -> Self {
        Self { x: 0, y: 0, zoom: 0 }
    }
}

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// A position in global pixel space at some zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned box in global pixel space.
///
/// `y` grows towards the south, matching tile rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBounds {
    /// Builds bounds from the upper-left and lower-right corners.
    pub fn from_corners(upper_left: PixelPoint, lower_right: PixelPoint) -> Self {
        let x = upper_left.x.min(lower_right.x);
        let y = upper_left.y.min(lower_right.y);
        Self {
            x,
            y,
            width: (lower_right.x - upper_left.x).abs(),
            height: (lower_right.y - upper_left.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Errors raised by projection math and identifier parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// Zoom level is negative or deeper than [`MAX_ZOOM`]
    #[error("Invalid zoom level: {0} (must be between 0 and {})", MAX_ZOOM)]
    InvalidZoom(i64),

    /// Tile coordinates fall outside the pyramid at their zoom
    #[error("Tile {x}/{y} is outside zoom level {zoom}")]
    TileOutOfRange { x: u32, y: u32, zoom: u8 },

    /// Quad key contains a digit outside 0-3 or has the wrong length
    #[error("Invalid quad key: '{key}' ({reason})")]
    InvalidQuadKey { key: String, reason: String },

    /// Extent has a non-finite coordinate or an inverted axis
    #[error("Invalid extent [{min_x}, {min_y}, {max_x}, {max_y}]: {reason}")]
    InvalidExtent {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        reason: String,
    },

    /// Conversion between these projections is not supported in-process
    #[error("Unsupported projection for tiling: {0}")]
    UnsupportedProjection(String),
}
