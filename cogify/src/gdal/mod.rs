//! External GDAL tooling.
//!
//! All raster I/O is delegated to the GDAL command-line tools. This module
//! builds their command lines, runs them natively or inside a container,
//! and turns their terminal progress output into progress values.
//!
//! - [`command`]: [`GdalCommand`] builders for each tool
//! - [`progress`]: [`ProgressParser`] for `0...10...20...` output
//! - [`runner`]: the [`GdalRunner`] seam and the process-backed [`ProcessRunner`]

pub mod command;
pub mod progress;
pub mod runner;

pub use command::{
    build_vrt, info_json, translate_cog, warp_vrt, GdalCommand, GdalConfig, TranslateOptions,
    DEFAULT_CONTAINER, DEFAULT_CONTAINER_TAG,
};
pub use progress::ProgressParser;
pub use runner::{GdalError, GdalOutput, GdalResult, GdalRunner, ProcessRunner, ProgressSender};
