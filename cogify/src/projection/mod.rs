//! Tile projection module
//!
//! Provides conversions between geographic extents, pseudo-Mercator meters,
//! global pixel coordinates, tile indices and quad keys for a power-of-two
//! tile pyramid. Everything here is pure math: no state, no I/O, safe to use
//! from any number of threads.

mod epsg;
mod extent;
mod quadkey;
mod types;

pub use epsg::Epsg;
pub use extent::{lat_lon_to_meters, meters_to_lat_lon, GeoExtent};
pub use quadkey::{QuadKey, ROOT_FILE_STEM};
pub use types::{
    tiles_per_axis, LatLon, PixelBounds, PixelPoint, ProjectionError, TileIndex,
    DEFAULT_TILE_SIZE, EARTH_RADIUS, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, ORIGIN_SHIFT,
};

use std::f64::consts::PI;

/// Fraction of the world width within which a coordinate counts as lying on
/// a tile boundary (about 40 micrometres).
const EDGE_TOLERANCE: f64 = 1e-12;

/// Inclusive range of tile columns and rows at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Number of tiles in the range.
    pub fn count(&self) -> u64 {
        u64::from(self.max_x - self.min_x + 1) * u64::from(self.max_y - self.min_y + 1)
    }

    /// Tiles in row-major order (north to south, then west to east).
    pub fn tiles(&self) -> impl Iterator<Item = TileIndex> + '_ {
        (self.min_y..=self.max_y).flat_map(move |y| {
            (self.min_x..=self.max_x).map(move |x| TileIndex {
                x,
                y,
                zoom: self.zoom,
            })
        })
    }
}

/// Fixed tile size plus the derived resolution at zoom 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileScheme {
    tile_size: u32,
    initial_resolution: f64,
}

impl Default for TileScheme {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE)
    }
}

impl TileScheme {
    /// Creates a scheme for square tiles of `tile_size` pixels.
    ///
    /// A size of zero is treated as one pixel.
    pub fn new(tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            tile_size,
            initial_resolution: 2.0 * PI * EARTH_RADIUS / tile_size as f64,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Meters per pixel at zoom 0.
    pub fn initial_resolution(&self) -> f64 {
        self.initial_resolution
    }

    /// Meters per pixel at `zoom`.
    #[inline]
    pub fn resolution(&self, zoom: u8) -> f64 {
        self.initial_resolution / 2f64.powi(zoom as i32)
    }

    /// Checks an untyped zoom value and narrows it.
    pub fn validate_zoom(zoom: i64) -> Result<u8, ProjectionError> {
        if !(0..=MAX_ZOOM as i64).contains(&zoom) {
            return Err(ProjectionError::InvalidZoom(zoom));
        }
        Ok(zoom as u8)
    }

    /// Pixel position of a tile's upper-left corner.
    #[inline]
    pub fn pixel_origin(&self, tile_x: u32, tile_y: u32) -> PixelPoint {
        let size = self.tile_size as f64;
        PixelPoint {
            x: tile_x as f64 * size,
            y: tile_y as f64 * size,
        }
    }

    /// Pixel box covered by a tile.
    pub fn tile_pixel_bounds(&self, tile_x: u32, tile_y: u32) -> PixelBounds {
        let origin = self.pixel_origin(tile_x, tile_y);
        let size = self.tile_size as f64;
        PixelBounds {
            x: origin.x,
            y: origin.y,
            width: size,
            height: size,
        }
    }

    /// Converts pseudo-Mercator meters to pixels at `zoom`.
    ///
    /// Both axes are shifted by [`ORIGIN_SHIFT`], so pass `-my` to get a
    /// pixel row that grows towards the south.
    #[inline]
    pub fn meters_to_pixels(&self, mx: f64, my: f64, zoom: u8) -> PixelPoint {
        let res = self.resolution(zoom);
        PixelPoint {
            x: (mx + ORIGIN_SHIFT) / res,
            y: (my + ORIGIN_SHIFT) / res,
        }
    }

    /// Projects an extent into pixel space at `zoom`.
    ///
    /// WGS84 extents are converted to meters first.
    pub fn pixel_bounds_from_extent(
        &self,
        extent: &GeoExtent,
        zoom: u8,
    ) -> Result<PixelBounds, ProjectionError> {
        let meters = extent.to_mercator()?;
        let upper_left = self.meters_to_pixels(meters.min_x(), -meters.max_y(), zoom);
        let lower_right = self.meters_to_pixels(meters.max_x(), -meters.min_y(), zoom);
        Ok(PixelBounds::from_corners(upper_left, lower_right))
    }

    /// Tiles whose closed footprint intersects an extent at `zoom`.
    ///
    /// Touching counts: an extent edge lying on a tile boundary selects the
    /// tiles on both sides of it. The result is clamped to the grid.
    pub fn tile_range(&self, extent: &GeoExtent, zoom: u8) -> Result<TileRange, ProjectionError> {
        let bounds = self.pixel_bounds_from_extent(extent, zoom)?;
        let size = self.tile_size as f64;
        let n = tiles_per_axis(zoom) as f64;
        let last = n - 1.0;
        let slack = EDGE_TOLERANCE * n;

        let axis = |start: f64, end: f64| -> (u32, u32) {
            let first = ((start / size - slack).ceil() - 1.0).clamp(0.0, last);
            let final_tile = (end / size + slack).floor().clamp(0.0, last);
            (first as u32, final_tile.max(first) as u32)
        };

        let (min_x, max_x) = axis(bounds.x, bounds.right());
        let (min_y, max_y) = axis(bounds.y, bounds.bottom());
        Ok(TileRange {
            zoom,
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Footprint of a tile in pseudo-Mercator meters.
    pub fn tile_bounds_meters(&self, tile: &TileIndex) -> Result<GeoExtent, ProjectionError> {
        let span = 2.0 * ORIGIN_SHIFT / tiles_per_axis(tile.zoom) as f64;
        let min_x = tile.x as f64 * span - ORIGIN_SHIFT;
        let max_y = ORIGIN_SHIFT - tile.y as f64 * span;
        GeoExtent::new(min_x, max_y - span, min_x + span, max_y, Epsg::Google)
    }

    /// Footprint of a tile in WGS84 degrees.
    pub fn tile_bounds_lat_lon(&self, tile: &TileIndex) -> Result<GeoExtent, ProjectionError> {
        let north_west = tile_corner_lat_lon(tile.x, tile.y, tile.zoom);
        let south_east = tile_corner_lat_lon(tile.x + 1, tile.y + 1, tile.zoom);
        GeoExtent::new(
            north_west.lon,
            south_east.lat,
            south_east.lon,
            north_west.lat,
            Epsg::Wgs84,
        )
    }

    /// Midpoint of the tile's geographic bounding box.
    pub fn tile_to_lat_lon_center(&self, tile: &TileIndex) -> LatLon {
        let north_west = tile_corner_lat_lon(tile.x, tile.y, tile.zoom);
        let south_east = tile_corner_lat_lon(tile.x + 1, tile.y + 1, tile.zoom);
        LatLon {
            lat: (north_west.lat + south_east.lat) / 2.0,
            lon: (north_west.lon + south_east.lon) / 2.0,
        }
    }

    /// Nearest pyramid level for a native pixel size in meters.
    ///
    /// Returns `None` for sizes that are not positive and finite.
    pub fn zoom_for_resolution(&self, meters_per_pixel: f64) -> Option<u8> {
        if !meters_per_pixel.is_finite() || meters_per_pixel <= 0.0 {
            return None;
        }
        let zoom = (self.initial_resolution / meters_per_pixel).log2().round();
        Some(zoom.clamp(0.0, MAX_ZOOM as f64) as u8)
    }
}

/// Encodes a tile index as a quad key.
#[inline]
pub fn tile_to_quad_key(tile: &TileIndex) -> QuadKey {
    QuadKey::from_tile(tile)
}

/// Decodes a quad key string into its tile index.
pub fn quad_key_to_tile(key: &str) -> Result<TileIndex, ProjectionError> {
    Ok(QuadKey::parse(key)?.to_tile())
}

/// Converts geographic coordinates to the tile containing them.
pub fn lat_lon_to_tile(lat: f64, lon: f64, zoom: u8) -> Result<TileIndex, ProjectionError> {
    if zoom > MAX_ZOOM {
        return Err(ProjectionError::InvalidZoom(zoom as i64));
    }
    if !(MIN_LAT..=MAX_LAT).contains(&lat) || !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(ProjectionError::InvalidExtent {
            min_x: lon,
            min_y: lat,
            max_x: lon,
            max_y: lat,
            reason: "coordinate outside the Web Mercator world".to_string(),
        });
    }

    let n = tiles_per_axis(zoom) as f64;
    let last = n - 1.0;

    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, last);

    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, last);

    Ok(TileIndex {
        x: x as u32,
        y: y as u32,
        zoom,
    })
}

/// Latitude/longitude of a tile grid corner (north-west corner of `x`,`y`).
fn tile_corner_lat_lon(x: u32, y: u32, zoom: u8) -> LatLon {
    let n = tiles_per_axis(zoom) as f64;
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan().to_degrees();
    LatLon { lat, lon }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meters(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GeoExtent {
        GeoExtent::new(min_x, min_y, max_x, max_y, Epsg::Google).unwrap()
    }

    #[test]
    fn test_initial_resolution() {
        let scheme = TileScheme::new(256);
        assert!((scheme.initial_resolution() - 156543.03392804097).abs() < 1e-6);
        assert_eq!(scheme.resolution(0), scheme.initial_resolution());
    }

    #[test]
    fn test_resolution_halves_per_zoom() {
        let scheme = TileScheme::new(512);
        for zoom in 0..MAX_ZOOM {
            let ratio = scheme.resolution(zoom) / scheme.resolution(zoom + 1);
            assert!((ratio - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_resolution_strictly_decreasing() {
        let scheme = TileScheme::default();
        for zoom in 0..MAX_ZOOM {
            assert!(scheme.resolution(zoom) > scheme.resolution(zoom + 1));
        }
    }

    #[test]
    fn test_validate_zoom_rejects_negative() {
        assert_eq!(
            TileScheme::validate_zoom(-1),
            Err(ProjectionError::InvalidZoom(-1))
        );
        assert!(TileScheme::validate_zoom(MAX_ZOOM as i64 + 1).is_err());
        assert_eq!(TileScheme::validate_zoom(12), Ok(12));
    }

    #[test]
    fn test_pixel_origin() {
        let scheme = TileScheme::new(256);
        assert_eq!(scheme.pixel_origin(3, 7), PixelPoint { x: 768.0, y: 1792.0 });
        let bounds = scheme.tile_pixel_bounds(1, 1);
        assert_eq!(bounds.width, 256.0);
        assert_eq!(bounds.right(), 512.0);
    }

    #[test]
    fn test_meters_to_pixels_origin_and_corner() {
        let scheme = TileScheme::new(256);
        let origin = scheme.meters_to_pixels(-ORIGIN_SHIFT, -ORIGIN_SHIFT, 0);
        assert!(origin.x.abs() < 1e-9 && origin.y.abs() < 1e-9);

        let centre = scheme.meters_to_pixels(0.0, 0.0, 1);
        assert!((centre.x - 256.0).abs() < 1e-9);
        assert!((centre.y - 256.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_bounds_from_extent_flips_y() {
        let scheme = TileScheme::new(256);
        let world = meters(-ORIGIN_SHIFT, -ORIGIN_SHIFT, ORIGIN_SHIFT, ORIGIN_SHIFT);
        let bounds = scheme.pixel_bounds_from_extent(&world, 2).unwrap();
        assert!(bounds.x.abs() < 1e-6);
        assert!(bounds.y.abs() < 1e-6);
        assert!((bounds.width - 1024.0).abs() < 1e-6);
        assert!((bounds.height - 1024.0).abs() < 1e-6);

        // Northern half of the world sits at the top of pixel space
        let north = meters(-ORIGIN_SHIFT, 0.0, ORIGIN_SHIFT, ORIGIN_SHIFT);
        let bounds = scheme.pixel_bounds_from_extent(&north, 1).unwrap();
        assert!(bounds.y.abs() < 1e-6);
        assert!((bounds.bottom() - 256.0).abs() < 1e-6);
    }

    #[test]
    fn test_tile_range_inside_single_tile() {
        let scheme = TileScheme::new(256);
        let extent = meters(1000.0, 1000.0, 2000.0, 2000.0);
        let range = scheme.tile_range(&extent, 1).unwrap();
        assert_eq!(range.count(), 1);
        assert_eq!((range.min_x, range.min_y), (1, 0));
    }

    #[test]
    fn test_tile_range_spanning_origin() {
        let scheme = TileScheme::new(256);
        let extent = meters(-10.0, -10.0, 10.0, 10.0);
        let range = scheme.tile_range(&extent, 3).unwrap();
        assert_eq!((range.min_x, range.max_x), (3, 4));
        assert_eq!((range.min_y, range.max_y), (3, 4));
        assert_eq!(range.count(), 4);
    }

    #[test]
    fn test_tile_range_world_is_clamped() {
        let scheme = TileScheme::new(256);
        let world = meters(-ORIGIN_SHIFT, -ORIGIN_SHIFT, ORIGIN_SHIFT, ORIGIN_SHIFT);
        let range = scheme.tile_range(&world, 4).unwrap();
        assert_eq!((range.min_x, range.max_x), (0, 15));
        assert_eq!((range.min_y, range.max_y), (0, 15));
    }

    #[test]
    fn test_tile_range_touching_origin_selects_neighbours() {
        let scheme = TileScheme::new(256);
        let extent = meters(0.0, 0.0, 10.0, 10.0);
        for zoom in 1..=18 {
            let range = scheme.tile_range(&extent, zoom).unwrap();
            let centre = (tiles_per_axis(zoom) / 2) as u32;
            assert_eq!((range.min_x, range.max_x), (centre - 1, centre), "zoom {}", zoom);
            assert_eq!((range.min_y, range.max_y), (centre - 1, centre), "zoom {}", zoom);
        }
    }

    #[test]
    fn test_tile_range_max_edge_on_boundary_includes_next_tile() {
        let scheme = TileScheme::new(256);
        let tile = TileIndex::new(2, 1, 2).unwrap();
        let bounds = scheme.tile_bounds_meters(&tile).unwrap();
        let range = scheme.tile_range(&bounds, 2).unwrap();
        assert_eq!((range.min_x, range.max_x), (1, 3));
        assert_eq!((range.min_y, range.max_y), (0, 2));
        assert_eq!(range.count(), 9);
    }

    #[test]
    fn test_tile_range_point_on_corner_touches_four_tiles() {
        let scheme = TileScheme::new(256);
        let range = scheme.tile_range(&meters(0.0, 0.0, 0.0, 0.0), 1).unwrap();
        assert_eq!(range.count(), 4);
    }

    #[test]
    fn test_tile_range_row_major_order() {
        let range = TileRange {
            zoom: 3,
            min_x: 2,
            max_x: 3,
            min_y: 5,
            max_y: 6,
        };
        let tiles: Vec<_> = range.tiles().map(|t| (t.x, t.y)).collect();
        assert_eq!(tiles, vec![(2, 5), (3, 5), (2, 6), (3, 6)]);
    }

    #[test]
    fn test_tile_bounds_meters_root() {
        let scheme = TileScheme::default();
        let root = scheme.tile_bounds_meters(&TileIndex::root()).unwrap();
        assert!((root.min_x() + ORIGIN_SHIFT).abs() < 1e-6);
        assert!((root.max_y() - ORIGIN_SHIFT).abs() < 1e-6);
        assert!((root.width() - 2.0 * ORIGIN_SHIFT).abs() < 1e-6);
    }

    #[test]
    fn test_tile_bounds_lat_lon_quadrant() {
        let scheme = TileScheme::default();
        let north_east = TileIndex::new(1, 0, 1).unwrap();
        let bounds = scheme.tile_bounds_lat_lon(&north_east).unwrap();
        assert!((bounds.min_x() - 0.0).abs() < 1e-9);
        assert!((bounds.max_x() - 180.0).abs() < 1e-9);
        assert!(bounds.min_y().abs() < 1e-9);
        assert!((bounds.max_y() - MAX_LAT).abs() < 1e-9);
    }

    #[test]
    fn test_tile_center_root_is_origin() {
        let scheme = TileScheme::default();
        let centre = scheme.tile_to_lat_lon_center(&TileIndex::root());
        assert!(centre.lat.abs() < 1e-9);
        assert!(centre.lon.abs() < 1e-9);
    }

    #[test]
    fn test_tile_center_lies_inside_tile() {
        let scheme = TileScheme::default();
        let tile = lat_lon_to_tile(-41.2865, 174.7762, 12).unwrap();
        let centre = scheme.tile_to_lat_lon_center(&tile);
        assert_eq!(lat_lon_to_tile(centre.lat, centre.lon, 12).unwrap(), tile);
    }

    #[test]
    fn test_lat_lon_to_tile_known_value() {
        // New York City: 40.7128°N, 74.0060°W
        let tile = lat_lon_to_tile(40.7128, -74.0060, 16).unwrap();
        assert_eq!(tile.y, 24640);
        assert_eq!(tile.x, 19295);
    }

    #[test]
    fn test_lat_lon_to_tile_rejects_pole() {
        assert!(lat_lon_to_tile(90.0, 0.0, 4).is_err());
    }

    #[test]
    fn test_zoom_for_resolution() {
        let scheme = TileScheme::new(256);
        assert_eq!(scheme.zoom_for_resolution(scheme.resolution(0)), Some(0));
        assert_eq!(scheme.zoom_for_resolution(scheme.resolution(14)), Some(14));
        // 0.3m aerial imagery sits around zoom 19
        assert_eq!(scheme.zoom_for_resolution(0.3), Some(19));
        assert_eq!(scheme.zoom_for_resolution(0.0), None);
        assert_eq!(scheme.zoom_for_resolution(f64::NAN), None);
    }

    #[test]
    fn test_quad_key_helpers() {
        let tile = TileIndex::new(3, 5, 3).unwrap();
        assert_eq!(tile_to_quad_key(&tile).as_str(), "213");
        assert_eq!(quad_key_to_tile("213").unwrap(), tile);
        assert!(quad_key_to_tile("5").is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_tile_contains_its_center(
                lat in -85.0..85.0_f64,
                lon in -180.0..180.0_f64,
                zoom in 0u8..=20
            ) {
                let scheme = TileScheme::default();
                let tile = lat_lon_to_tile(lat, lon, zoom)?;
                let bounds = scheme.tile_bounds_lat_lon(&tile)?;
                let centre = scheme.tile_to_lat_lon_center(&tile);
                prop_assert!(centre.lon >= bounds.min_x() && centre.lon <= bounds.max_x());
                prop_assert!(centre.lat >= bounds.min_y() && centre.lat <= bounds.max_y());
            }

            #[test]
            fn test_tile_range_contains_point_tile(
                lat in -85.0..85.0_f64,
                lon in -179.9..179.9_f64,
                zoom in 0u8..=18
            ) {
                let scheme = TileScheme::default();
                let point = GeoExtent::new(lon, lat, lon, lat, Epsg::Wgs84)?;
                let range = scheme.tile_range(&point, zoom)?;
                // One tile, or up to four when the point touches a boundary
                prop_assert!((1..=4).contains(&range.count()));
                let tile = lat_lon_to_tile(lat, lon, zoom)?;
                // Pixel and trigonometric paths may disagree by one tile on a boundary
                prop_assert!(range.min_x <= tile.x + 1 && tile.x <= range.max_x + 1);
                prop_assert!(range.min_y <= tile.y + 1 && tile.y <= range.max_y + 1);
            }

            #[test]
            fn test_resolution_monotonic(zoom in 0u8..MAX_ZOOM, size in 1u32..4096) {
                let scheme = TileScheme::new(size);
                prop_assert!(scheme.resolution(zoom) > scheme.resolution(zoom + 1));
            }
        }
    }
}
