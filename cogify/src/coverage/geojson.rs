//! GeoJSON rendering of a covering for inspection.
//!
//! Sources and covering tiles are written as polygons in WGS84 so the file
//! can be dropped onto any web map.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::types::CoverageResult;
use crate::projection::{GeoExtent, ProjectionError, TileScheme};

/// Fill colour used for covering tiles.
const COVERING_FILL: &str = "#e76868";

/// Fill opacity used for covering tiles.
const COVERING_FILL_OPACITY: f64 = 0.5;

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<Feature>,
}

/// A GeoJSON `Feature` with a polygon geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub geometry: Polygon,
    pub properties: Map<String, Value>,
}

/// A GeoJSON `Polygon` with a single outer ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    #[serde(rename = "type")]
    kind: &'static str,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl Feature {
    /// Polygon feature for an extent, reprojected to WGS84.
    pub fn from_extent(
        extent: &GeoExtent,
        properties: Map<String, Value>,
    ) -> Result<Self, ProjectionError> {
        let ring = extent.to_wgs84()?.ring().to_vec();
        Ok(Self {
            kind: "Feature",
            geometry: Polygon {
                kind: "Polygon",
                coordinates: vec![ring],
            },
            properties,
        })
    }

    /// Value of the `name` property, if any.
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection",
            features,
        }
    }

    /// Sources followed by covering tiles.
    ///
    /// Source features are named from `source_names` where available and
    /// `source-<i>` otherwise; tiles are named `covering-<i>` and carry their
    /// quad key.
    pub fn from_coverage(
        scheme: &TileScheme,
        coverage: &CoverageResult,
        source_names: &[String],
    ) -> Result<Self, ProjectionError> {
        let mut features = Vec::with_capacity(coverage.source_extents.len() + coverage.len());

        for (index, extent) in coverage.source_extents.iter().enumerate() {
            let name = source_names
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("source-{}", index));
            let properties = properties(json!({ "name": name }));
            features.push(Feature::from_extent(extent, properties)?);
        }

        for (index, key) in coverage.tiles.iter().enumerate() {
            let bounds = scheme.tile_bounds_meters(&key.to_tile())?;
            let properties = properties(json!({
                "name": format!("covering-{}", index),
                "quadKey": key.as_str(),
                "fill": COVERING_FILL,
                "fill-opacity": COVERING_FILL_OPACITY,
            }));
            features.push(Feature::from_extent(&bounds, properties)?);
        }

        Ok(Self::new(features))
    }

    /// Pretty-printed JSON, two-space indented.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
