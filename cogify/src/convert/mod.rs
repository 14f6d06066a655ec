//! Conversion of a directory of rasters into per-tile COGs.
//!
//! [`ConversionOrchestrator`] is the entry point. It plans a covering for the
//! sources, builds the shared mosaic once, and dispatches one
//! [`ConversionJob`] per covering tile through a [`GdalRunner`]. Progress is
//! reported as [`ConvertEvent`]s and the result as a [`RunSummary`].
//!
//! [`GdalRunner`]: crate::gdal::GdalRunner

mod error;
mod events;
mod job;
mod orchestrator;
mod state;
mod summary;

pub use error::{ConvertError, ConvertResult};
pub use events::ConvertEvent;
pub use job::{
    plan_jobs, ConversionJob, JobPlan, MosaicPaths, MOSAIC_FILE_NAME, WARPED_MOSAIC_FILE_NAME,
};
pub use orchestrator::{ConversionOrchestrator, ConversionPlan};
pub use state::RunState;
pub use summary::{RunOutcome, RunSummary, TileOutcome, TileStatus, SUMMARY_FILE_NAME};
