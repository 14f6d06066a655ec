//! Conversion run orchestration.
//!
//! A run plans a covering for the sources in an input directory, builds a
//! pseudo-Mercator mosaic once, then extracts one cloud-optimized GeoTIFF
//! per covering tile with bounded parallelism.

use std::collections::HashMap;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{ConvertError, ConvertResult};
use super::events::{ConvertEvent, EventSink};
use super::job::{plan_jobs, ConversionJob, JobPlan, MosaicPaths};
use super::state::RunState;
use super::summary::{RunSummary, TileOutcome, TileStatus, SUMMARY_FILE_NAME};
use crate::config::ConvertConfig;
use crate::coverage::{CoverageBuilder, CoverageResult, FeatureCollection};
use crate::gdal::{GdalCommand, GdalRunner};
use crate::projection::{GeoExtent, QuadKey, TileScheme};
use crate::source::{list_source_files, MetadataReader, SourceRaster};

/// Everything decided before any external process runs.
#[derive(Debug, Clone)]
pub struct ConversionPlan {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sources: Vec<SourceRaster>,
    pub coverage: CoverageResult,
    /// Zoom matching the finest source resolution.
    pub source_zoom: u8,
    pub mosaic: MosaicPaths,
    /// Jobs to dispatch, in covering order.
    pub jobs: Vec<ConversionJob>,
}

/// Drives conversion runs.
pub struct ConversionOrchestrator {
    config: ConvertConfig,
    scheme: TileScheme,
    runner: Arc<dyn GdalRunner>,
    reader: Arc<dyn MetadataReader>,
}

impl ConversionOrchestrator {
    pub fn new(
        config: ConvertConfig,
        runner: Arc<dyn GdalRunner>,
        reader: Arc<dyn MetadataReader>,
    ) -> Self {
        let scheme = TileScheme::new(config.tile_size);
        Self {
            config,
            scheme,
            runner,
            reader,
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Reads source metadata and plans the covering and its jobs.
    ///
    /// Planning never starts an external process other than through the
    /// metadata reader, and is identical in dry-run and commit mode.
    pub async fn plan(&self, input_dir: &Path) -> ConvertResult<ConversionPlan> {
        self.config.validate()?;

        let files = list_source_files(input_dir)?;
        if files.is_empty() {
            return Err(ConvertError::Planning(format!(
                "no .tif or .tiff files found in {}",
                input_dir.display()
            )));
        }

        info!(
            input = %input_dir.display(),
            files = files.len(),
            "Reading source metadata"
        );
        let sources: Vec<SourceRaster> = stream::iter(files.iter())
            .map(|path| self.reader.read(path))
            .buffered(self.config.metadata_concurrency)
            .try_collect()
            .await?;

        let source_zoom = sources
            .iter()
            .filter_map(|source| self.scheme.zoom_for_resolution(source.resolution))
            .max()
            .ok_or_else(|| {
                ConvertError::Planning("no source has a usable pixel size".to_string())
            })?;
        let max_zoom = self.config.max_zoom.unwrap_or(source_zoom);

        let extents: Vec<GeoExtent> = sources.iter().map(|source| source.extent).collect();
        let coverage =
            CoverageBuilder::new(self.scheme).build(&extents, self.config.tile_budget, max_zoom)?;
        if coverage.is_no_input() {
            return Err(ConvertError::Planning(
                "no source extents to cover".to_string(),
            ));
        }

        let mosaic = MosaicPaths::new(input_dir);
        let output_dir = self.config.resolve_output_dir(input_dir);
        let mut jobs = plan_jobs(&JobPlan {
            scheme: &self.scheme,
            coverage: &coverage,
            source_zoom,
            mosaic: &mosaic.warped,
            output_dir: &output_dir,
            extension: &self.config.output_extension,
        })
        .map_err(|e| ConvertError::Validation(e.to_string()))?;

        if let Some(batch_index) = self.config.batch_index {
            if batch_index >= jobs.len() {
                return Err(ConvertError::Configuration(format!(
                    "batch index {} is outside the covering of {} tiles",
                    batch_index,
                    jobs.len()
                )));
            }
            jobs.retain(|job| job.index == batch_index);
        }

        info!(
            sources = sources.len(),
            source_zoom,
            zoom = coverage.zoom,
            tiles = coverage.len(),
            jobs = jobs.len(),
            "Covering planned"
        );

        Ok(ConversionPlan {
            input_dir: input_dir.to_path_buf(),
            output_dir,
            sources,
            coverage,
            source_zoom,
            mosaic,
            jobs,
        })
    }

    /// Runs a conversion over `input_dir`.
    ///
    /// Tile failures are recorded in the returned summary; only planning,
    /// mosaic and artifact errors fail the run. Cancelling `cancel` stops
    /// new submissions and lets in-flight tiles finish.
    pub async fn run(
        &self,
        input_dir: &Path,
        cancel: CancellationToken,
        events: Option<mpsc::UnboundedSender<ConvertEvent>>,
    ) -> ConvertResult<RunSummary> {
        let events = EventSink::new(events);
        let mut state = RunState::Planning;
        info!(
            input = %input_dir.display(),
            dry_run = self.config.dry_run,
            "Conversion run starting"
        );
        events.emit(ConvertEvent::State(state));

        let result = self.run_phases(input_dir, &cancel, &events, &mut state).await;
        match result {
            Ok(summary) => Ok(summary),
            Err(err) => {
                error!(state = %state, error = %err, "Conversion run failed");
                transition(&events, &mut state, RunState::Failed);
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        input_dir: &Path,
        cancel: &CancellationToken,
        events: &EventSink,
        state: &mut RunState,
    ) -> ConvertResult<RunSummary> {
        let plan = self.plan(input_dir).await?;
        events.emit(ConvertEvent::Planned {
            total: plan.jobs.len(),
            zoom: plan.coverage.zoom,
        });

        self.prepare_mosaic(&plan).await?;
        transition(events, state, RunState::MosaicReady);

        tokio::fs::create_dir_all(&plan.output_dir)
            .await
            .map_err(|e| ConvertError::io(&plan.output_dir, e))?;
        transition(events, state, RunState::Dispatching);

        let summary = self.dispatch(&plan, cancel, events, state).await;

        self.write_artifacts(&plan, &summary).await?;
        transition(events, state, RunState::Done);

        info!(
            outcome = ?summary.outcome(),
            converted = summary.count(TileStatus::Converted),
            planned = summary.count(TileStatus::Planned),
            skipped = summary.count(TileStatus::Skipped),
            failed = summary.failure_count(),
            cancelled = summary.count(TileStatus::Cancelled),
            "Conversion run finished"
        );
        Ok(summary)
    }

    /// Builds the source mosaic and its Mercator warp, once per run.
    async fn prepare_mosaic(&self, plan: &ConversionPlan) -> ConvertResult<()> {
        let sources: Vec<PathBuf> = plan.sources.iter().map(|s| s.path.clone()).collect();
        let [build, warp] = plan.mosaic.commands(&sources);

        if self.config.dry_run {
            for command in [&build, &warp] {
                info!(
                    command = %self.runner.command_line(command),
                    "Dry run, not executing"
                );
            }
            return Ok(());
        }

        for stale in [&plan.mosaic.vrt, &plan.mosaic.warped] {
            remove_if_exists(stale)
                .await
                .map_err(|e| ConvertError::io(stale, e))?;
        }

        info!(
            sources = sources.len(),
            vrt = %plan.mosaic.vrt.display(),
            "Building source mosaic"
        );
        self.run_stage("gdalbuildvrt", &build).await?;

        info!(vrt = %plan.mosaic.warped.display(), "Warping mosaic to EPSG:3857");
        self.run_stage("gdalwarp", &warp).await
    }

    async fn run_stage(&self, stage: &'static str, command: &GdalCommand) -> ConvertResult<()> {
        debug!(command = %self.runner.command_line(command), "Running {}", stage);
        self.runner
            .run(command, None)
            .await
            .map(|_| ())
            .map_err(|source| ConvertError::ExternalTool { stage, source })
    }

    /// Submits every job behind a semaphore and drains the results.
    async fn dispatch(
        &self,
        plan: &ConversionPlan,
        cancel: &CancellationToken,
        events: &EventSink,
        state: &mut RunState,
    ) -> RunSummary {
        let mut summary = RunSummary::new(
            plan.jobs.len(),
            plan.coverage.zoom,
            plan.source_zoom,
            self.config.dry_run,
        );
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let context = Arc::new(JobContext {
            runner: Arc::clone(&self.runner),
            events: events.clone(),
            tile_size: self.scheme.tile_size(),
            dry_run: self.config.dry_run,
        });
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<task::Id, (usize, QuadKey)> = HashMap::new();

        for job in &plan.jobs {
            // Waiting for a permit is the backpressure
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                debug!(quad_key = %job.quad_key, index = job.index, "Not submitted, run cancelled");
                summary.record(TileOutcome::cancelled(job.index, job.quad_key.clone()));
                continue;
            };

            let context = Arc::clone(&context);
            let job = job.clone();
            let tile = (job.index, job.quad_key.clone());
            let handle = tasks.spawn(async move {
                let _permit = permit;
                context.execute_guarded(job).await
            });
            pending.insert(handle.id(), tile);
        }

        if summary.cancelled {
            warn!(
                in_flight = tasks.len(),
                not_submitted = summary.count(TileStatus::Cancelled),
                "Run cancelled, waiting for in-flight tiles"
            );
        }
        transition(events, state, RunState::Draining);

        while let Some(joined) = tasks.join_next_with_id().await {
            if let Some(outcome) = joined_outcome(&mut pending, joined) {
                summary.record(outcome);
            }
        }

        summary.finish();
        summary
    }

    async fn write_artifacts(&self, plan: &ConversionPlan, summary: &RunSummary) -> ConvertResult<()> {
        if let Some(path) = &self.config.geojson_path {
            let names: Vec<String> = plan.sources.iter().map(SourceRaster::name).collect();
            let collection = FeatureCollection::from_coverage(&self.scheme, &plan.coverage, &names)
                .map_err(|e| ConvertError::Validation(e.to_string()))?;
            let json = collection
                .to_json_pretty()
                .map_err(|source| ConvertError::Artifact {
                    path: path.clone(),
                    source,
                })?;
            tokio::fs::write(path, json)
                .await
                .map_err(|e| ConvertError::io(path, e))?;
            info!(
                path = %path.display(),
                features = collection.features.len(),
                "Wrote coverage GeoJSON"
            );
        }

        let path = plan.output_dir.join(SUMMARY_FILE_NAME);
        let json = summary
            .to_json_pretty()
            .map_err(|source| ConvertError::Artifact {
                path: path.clone(),
                source,
            })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ConvertError::io(&path, e))?;
        debug!(path = %path.display(), "Wrote run summary");
        Ok(())
    }
}

/// Shared state for tile jobs.
struct JobContext {
    runner: Arc<dyn GdalRunner>,
    events: EventSink,
    tile_size: u32,
    dry_run: bool,
}

impl JobContext {
    /// Runs a job, turning a panic into a failed outcome for that tile.
    async fn execute_guarded(&self, job: ConversionJob) -> TileOutcome {
        let started = Instant::now();
        let (index, quad_key) = (job.index, job.quad_key.clone());
        match AssertUnwindSafe(self.execute(job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(quad_key = %quad_key, index, "Tile job panicked");
                TileOutcome::failed(
                    index,
                    quad_key,
                    started.elapsed(),
                    "tile job panicked".to_string(),
                )
            }
        }
    }

    async fn execute(&self, job: ConversionJob) -> TileOutcome {
        let started = Instant::now();
        let command = job.command(self.tile_size);
        let command_line = self.runner.command_line(&command);

        info!(quad_key = %job.quad_key, index = job.index, "Start");
        debug!(
            quad_key = %job.quad_key,
            x = job.tile.x,
            y = job.tile.y,
            zoom = job.tile.zoom,
            alignment_levels = job.alignment_levels,
            clip = ?[job.clip.min_x(), job.clip.min_y(), job.clip.max_x(), job.clip.max_y()],
            pixels = ?job.pixels,
            command = %command_line,
            "Tile job"
        );
        self.events.emit(ConvertEvent::Started {
            quad_key: job.quad_key.clone(),
            index: job.index,
        });

        let result = if self.dry_run {
            Ok(TileStatus::Planned)
        } else {
            self.convert(&job, &command).await
        };

        let duration = started.elapsed();
        let outcome = match result {
            Ok(status) => TileOutcome::new(job.index, job.quad_key.clone(), status, duration),
            Err(message) => {
                error!(
                    quad_key = %job.quad_key,
                    index = job.index,
                    command = %command_line,
                    error = %message,
                    "Tile conversion failed"
                );
                TileOutcome::failed(job.index, job.quad_key.clone(), duration, message)
            }
        };

        info!(
            quad_key = %job.quad_key,
            index = job.index,
            duration_ms = outcome.duration_ms,
            status = ?outcome.status,
            "Done"
        );
        self.events.emit(ConvertEvent::Finished {
            quad_key: job.quad_key,
            index: job.index,
            status: outcome.status,
            duration,
        });
        outcome
    }

    /// Runs the tool into the temporary file and moves it into place.
    async fn convert(&self, job: &ConversionJob, command: &GdalCommand) -> Result<TileStatus, String> {
        if tokio::fs::try_exists(&job.output).await.unwrap_or(false) {
            info!(
                quad_key = %job.quad_key,
                output = %job.output.display(),
                "Output exists, skipping"
            );
            return Ok(TileStatus::Skipped);
        }

        let temp = job.temp_output();
        remove_if_exists(&temp)
            .await
            .map_err(|e| format!("failed to remove stale {}: {}", temp.display(), e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = self.runner.run(command, Some(tx));
        tokio::pin!(run);

        let mut last_tick = Instant::now();
        let result = loop {
            tokio::select! {
                Some(progress) = rx.recv() => self.report_progress(job, progress, &mut last_tick),
                result = &mut run => break result,
            }
        };
        while let Ok(progress) = rx.try_recv() {
            self.report_progress(job, progress, &mut last_tick);
        }

        if let Err(e) = result {
            if let Err(cleanup) = remove_if_exists(&temp).await {
                warn!(path = %temp.display(), error = %cleanup, "Failed to remove partial output");
            }
            return Err(e.to_string());
        }

        tokio::fs::rename(&temp, &job.output).await.map_err(|e| {
            format!(
                "failed to move {} to {}: {}",
                temp.display(),
                job.output.display(),
                e
            )
        })?;
        Ok(TileStatus::Converted)
    }

    fn report_progress(&self, job: &ConversionJob, progress: f64, last_tick: &mut Instant) {
        let now = Instant::now();
        let since_last = now.duration_since(*last_tick);
        *last_tick = now;

        debug!(
            quad_key = %job.quad_key,
            index = job.index,
            progress = %format!("{:.2}", progress * 100.0),
            since_last_ms = since_last.as_millis() as u64,
            "Progress"
        );
        self.events.emit(ConvertEvent::Progress {
            quad_key: job.quad_key.clone(),
            index: job.index,
            progress,
            since_last,
        });
    }
}

/// Outcome of a joined tile task. A task that did not complete is recorded
/// as a failure of the tile it was spawned for.
fn joined_outcome(
    pending: &mut HashMap<task::Id, (usize, QuadKey)>,
    joined: Result<(task::Id, TileOutcome), JoinError>,
) -> Option<TileOutcome> {
    match joined {
        Ok((id, outcome)) => {
            pending.remove(&id);
            Some(outcome)
        }
        Err(e) => {
            let Some((index, quad_key)) = pending.remove(&e.id()) else {
                error!(error = %e, "Unknown tile task did not complete");
                return None;
            };
            error!(quad_key = %quad_key, index, error = %e, "Tile task did not complete");
            Some(TileOutcome::failed(
                index,
                quad_key,
                Duration::ZERO,
                format!("tile task did not complete: {}", e),
            ))
        }
    }
}

fn transition(events: &EventSink, state: &mut RunState, next: RunState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal run transition {} -> {}",
        state,
        next
    );
    info!(from = %state, to = %next, "Run state changed");
    *state = next;
    events.emit(ConvertEvent::State(next));
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
