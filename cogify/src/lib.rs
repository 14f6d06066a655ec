//! Cogify - cloud-optimized GeoTIFF tiling for imagery directories
//!
//! Given a directory of georeferenced rasters, cogify picks the finest set
//! of Web Mercator tiles (at most a configured budget) that covers every
//! source, then extracts one cloud-optimized GeoTIFF per tile with the GDAL
//! command-line tools.
//!
//! - [`projection`]: tile pyramid math, extents and quad keys
//! - [`coverage`]: covering computation and its GeoJSON rendering
//! - [`source`]: source discovery and metadata
//! - [`gdal`]: external tool commands and execution
//! - [`convert`]: the run orchestrator
//! - [`config`] and [`logging`]: ambient setup for binaries

pub mod config;
pub mod convert;
pub mod coverage;
pub mod gdal;
pub mod logging;
pub mod projection;
pub mod source;
