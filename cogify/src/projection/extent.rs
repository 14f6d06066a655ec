//! Axis-aligned geographic extents.

use std::f64::consts::PI;

use serde::Serialize;

use super::epsg::Epsg;
use super::types::{LatLon, ProjectionError, EARTH_RADIUS, MAX_LAT, MIN_LAT, ORIGIN_SHIFT};

/// Bounding box `[min_x, min_y, max_x, max_y]` in a named projection.
///
/// Construct with [`GeoExtent::new`]; every instance has finite coordinates
/// and `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoExtent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    #[serde(skip)]
    projection: Epsg,
}

impl GeoExtent {
    /// Creates a validated extent.
    pub fn new(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        projection: Epsg,
    ) -> Result<Self, ProjectionError> {
        let invalid = |reason: &str| ProjectionError::InvalidExtent {
            min_x,
            min_y,
            max_x,
            max_y,
            reason: reason.to_string(),
        };

        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(invalid("coordinates must be finite"));
        }
        if min_x > max_x {
            return Err(invalid("min_x is greater than max_x"));
        }
        if min_y > max_y {
            return Err(invalid("min_y is greater than max_y"));
        }

        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
            projection,
        })
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn projection(&self) -> Epsg {
        self.projection
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Smallest extent containing both `self` and `other`.
    ///
    /// Both extents must share a projection.
    pub fn union(&self, other: &GeoExtent) -> Result<GeoExtent, ProjectionError> {
        if self.projection != other.projection {
            return Err(ProjectionError::UnsupportedProjection(format!(
                "cannot union {} with {}",
                self.projection, other.projection
            )));
        }
        GeoExtent::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
            self.projection,
        )
    }

    /// Whether two extents overlap or touch.
    pub fn intersects(&self, other: &GeoExtent) -> bool {
        self.projection == other.projection
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Whether `other` lies completely inside `self`.
    pub fn contains(&self, other: &GeoExtent) -> bool {
        self.projection == other.projection
            && self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Converts the extent to pseudo-Mercator meters.
    ///
    /// Geographic extents are clamped to the Mercator latitude limit and
    /// projected; Mercator extents are clamped to the world square.
    pub fn to_mercator(&self) -> Result<GeoExtent, ProjectionError> {
        match self.projection {
            Epsg::Google => GeoExtent::new(
                self.min_x.clamp(-ORIGIN_SHIFT, ORIGIN_SHIFT),
                self.min_y.clamp(-ORIGIN_SHIFT, ORIGIN_SHIFT),
                self.max_x.clamp(-ORIGIN_SHIFT, ORIGIN_SHIFT),
                self.max_y.clamp(-ORIGIN_SHIFT, ORIGIN_SHIFT),
                Epsg::Google,
            ),
            Epsg::Wgs84 => {
                let (min_x, min_y) = lat_lon_to_meters(self.min_y, self.min_x);
                let (max_x, max_y) = lat_lon_to_meters(self.max_y, self.max_x);
                GeoExtent::new(min_x, min_y, max_x, max_y, Epsg::Google)
            }
            other => Err(ProjectionError::UnsupportedProjection(other.to_string())),
        }
    }

    /// Converts the extent to WGS84 degrees.
    pub fn to_wgs84(&self) -> Result<GeoExtent, ProjectionError> {
        match self.projection {
            Epsg::Wgs84 => Ok(*self),
            Epsg::Google => {
                let min = meters_to_lat_lon(self.min_x, self.min_y);
                let max = meters_to_lat_lon(self.max_x, self.max_y);
                GeoExtent::new(min.lon, min.lat, max.lon, max.lat, Epsg::Wgs84)
            }
            other => Err(ProjectionError::UnsupportedProjection(other.to_string())),
        }
    }

    /// Closed ring of the extent's corners, counter-clockwise from south-west.
    pub fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.min_x, self.min_y],
            [self.max_x, self.min_y],
            [self.max_x, self.max_y],
            [self.min_x, self.max_y],
            [self.min_x, self.min_y],
        ]
    }
}

/// Projects a WGS84 coordinate to pseudo-Mercator meters.
pub fn lat_lon_to_meters(lat: f64, lon: f64) -> (f64, f64) {
    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let mx = lon * ORIGIN_SHIFT / 180.0;
    let my = ((90.0 + lat) * PI / 360.0).tan().ln() * EARTH_RADIUS;
    (mx, my)
}

/// Inverse of [`lat_lon_to_meters`].
pub fn meters_to_lat_lon(mx: f64, my: f64) -> LatLon {
    let lon = mx / ORIGIN_SHIFT * 180.0;
    let lat = (2.0 * (my / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    LatLon { lat, lon }
}
