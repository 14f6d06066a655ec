//! Source raster discovery and metadata.
//!
//! Inputs are the `.tif`/`.tiff` files directly inside an input directory.
//! Their extents and native resolutions come from a [`MetadataReader`],
//! normally [`GdalInfoReader`].

mod raster;
mod reader;

pub use raster::{is_source_file, list_source_files, SourceError, SourceRaster, SOURCE_EXTENSIONS};
pub use reader::{parse_gdalinfo, GdalInfoReader, MetadataReader};
