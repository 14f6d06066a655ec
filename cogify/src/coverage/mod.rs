//! Coverage builder
//!
//! Chooses the finest zoom level at which the tiles touching a set of source
//! extents fit inside a tile budget, and renders the result as GeoJSON.

mod builder;
mod geojson;
mod types;

pub use builder::CoverageBuilder;
pub use geojson::{Feature, FeatureCollection, Polygon};
pub use types::{CoverageError, CoverageResult, CoverageStatus};
