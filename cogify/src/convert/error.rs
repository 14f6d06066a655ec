//! Error types for conversion runs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::coverage::CoverageError;
use crate::gdal::GdalError;
use crate::source::SourceError;

/// Errors that stop a conversion run.
///
/// Per-tile failures are not errors at this level; they are recorded in
/// the run summary.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Settings no run could use
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input that violates a geometric precondition
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Nothing to convert, or no covering could be planned
    #[error("Planning failed: {0}")]
    Planning(String),

    /// Source metadata could not be read
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A run-level external tool (mosaic build or warp) failed
    #[error("{stage} failed: {source}")]
    ExternalTool {
        stage: &'static str,
        #[source]
        source: GdalError,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to encode an output artifact
    #[error("Failed to write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by settings rather than by data or tools.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ConvertError::Configuration(_))
    }
}

impl From<ConfigError> for ConvertError {
    fn from(err: ConfigError) -> Self {
        ConvertError::Configuration(err.to_string())
    }
}

impl From<CoverageError> for ConvertError {
    fn from(err: CoverageError) -> Self {
        match err {
            CoverageError::InvalidBudget(_) | CoverageError::InvalidZoom(_) => {
                ConvertError::Configuration(err.to_string())
            }
            CoverageError::Validation { .. } | CoverageError::Union(_) => {
                ConvertError::Validation(err.to_string())
            }
        }
    }
}

/// Result type for conversion runs.
pub type ConvertResult<T> = Result<T, ConvertError>;
