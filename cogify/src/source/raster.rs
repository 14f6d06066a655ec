//! Source raster discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::gdal::GdalError;
use crate::projection::{GeoExtent, ProjectionError};

/// File extensions accepted as source rasters, compared case-insensitively.
pub const SOURCE_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Errors raised while discovering or describing source rasters.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to list {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read metadata for {}: {source}", path.display())]
    Tool {
        path: PathBuf,
        #[source]
        source: GdalError,
    },

    #[error("Invalid metadata for {}: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("Invalid extent for {}: {source}", path.display())]
    Extent {
        path: PathBuf,
        #[source]
        source: ProjectionError,
    },
}

/// A georeferenced input raster.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRaster {
    pub path: PathBuf,
    /// Extent in WGS84 degrees.
    pub extent: GeoExtent,
    pub width: u64,
    pub height: u64,
    /// Horizontal pseudo-Mercator meters per pixel.
    pub resolution: f64,
}

impl SourceRaster {
    /// File name, used to label the raster in coverage output.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Whether `path` names a source raster by extension.
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Lists source rasters directly inside `dir`, sorted by path.
///
/// Subdirectories are not searched.
pub fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if path.is_file() && is_source_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("a.tif")));
        assert!(is_source_file(Path::new("a.TIFF")));
        assert!(is_source_file(Path::new("/x/y/BX24_500_0101.Tif")));
        assert!(!is_source_file(Path::new("a.vrt")));
        assert!(!is_source_file(Path::new("a.tif.aux.xml")));
        assert!(!is_source_file(Path::new("tif")));
    }

    #[test]
    fn test_list_source_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["c.tif", "a.TIFF", "b.tiff", "notes.txt", ".vrt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.tif")).unwrap();

        let files = list_source_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TIFF", "b.tiff", "c.tif"]);
    }

    #[test]
    fn test_list_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(list_source_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_list_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            list_source_files(&missing),
            Err(SourceError::Io { .. })
        ));
    }
}
