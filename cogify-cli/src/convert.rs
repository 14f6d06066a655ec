//! The conversion command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use cogify::config::{apply_env, config_file_path, load_config_file, ConvertConfig};
use cogify::convert::{ConversionOrchestrator, RunOutcome, RunSummary};
use cogify::gdal::ProcessRunner;
use cogify::logging::{default_log_dir, default_log_file, init_logging};
use cogify::source::GdalInfoReader;

use crate::error::CliError;
use crate::progress::{self, ProgressDisplay};

/// Coverage GeoJSON written when neither the flag nor the config file names one.
pub const DEFAULT_GEOJSON: &str = "output.geojson";

/// Exit code for a run where some tiles failed.
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Exit code for a cancelled run.
pub const EXIT_CANCELLED: u8 = 130;

/// Arguments for the convert command.
#[derive(Debug, Default, Clone)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub max_tiles: Option<usize>,
    pub commit: bool,
    pub concurrency: Option<usize>,
    pub max_zoom: Option<u8>,
    pub geojson: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub docker: bool,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

/// Builds the run configuration: defaults, config file, environment, flags.
pub fn resolve_config<F, E>(args: &ConvertArgs, env: F) -> Result<ConvertConfig, CliError>
where
    F: Fn(&str) -> Result<String, E>,
{
    let config_path = args.config.clone().unwrap_or_else(config_file_path);
    if args.config.is_some() && !config_path.exists() {
        return Err(CliError::Config(format!(
            "config file {} does not exist",
            config_path.display()
        )));
    }

    let config = load_config_file(&config_path, ConvertConfig::default())?;
    let mut config = apply_env(config, env)?;

    if let Some(max_tiles) = args.max_tiles {
        config.tile_budget = max_tiles;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(max_zoom) = args.max_zoom {
        config.max_zoom = Some(max_zoom);
    }
    if args.commit {
        config.dry_run = false;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = Some(dir.clone());
    }
    if args.docker {
        config.gdal.use_docker = true;
    }
    match &args.geojson {
        Some(path) => config.geojson_path = Some(path.clone()),
        None if config.geojson_path.is_none() => {
            config.geojson_path = Some(PathBuf::from(DEFAULT_GEOJSON))
        }
        None => {}
    }

    config.validate()?;
    Ok(config)
}

/// Process exit code for a finished run.
pub fn exit_code(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Success => 0,
        RunOutcome::PartialFailure => EXIT_PARTIAL_FAILURE,
        RunOutcome::Cancelled => EXIT_CANCELLED,
    }
}

fn resolve_input(input: &Path) -> Result<PathBuf, CliError> {
    let path = input
        .canonicalize()
        .map_err(|e| CliError::Input(format!("{}: {}", input.display(), e)))?;
    if !path.is_dir() {
        return Err(CliError::Input(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(path)
}

/// Run the convert command.
pub fn run(args: ConvertArgs) -> Result<u8, CliError> {
    let _logging = init_logging(&default_log_dir(), default_log_file(), args.verbose)
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let config = resolve_config(&args, |name| std::env::var(name))?;
    let input = resolve_input(&args.input)?;
    info!(
        input = %input.display(),
        tile_budget = config.tile_budget,
        concurrency = config.concurrency,
        dry_run = config.dry_run,
        docker = config.gdal.use_docker,
        "cogify starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    // Set up signal handler for graceful shutdown
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, finishing tiles in progress...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runner = Arc::new(ProcessRunner::new(config.gdal.clone()));
    let reader = Arc::new(GdalInfoReader::new(runner.clone()));
    let orchestrator = ConversionOrchestrator::new(config, runner, reader);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let display = runtime.spawn(progress::drive(rx, ProgressDisplay::new()));
    let result: Result<RunSummary, _> =
        runtime.block_on(orchestrator.run(&input, cancel, Some(tx)));
    // The display ends once the run has dropped every event sender
    let _ = runtime.block_on(display);

    let summary = result?;
    progress::print_summary(&summary);
    Ok(exit_code(summary.outcome()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Result<String, ()> {
        Err(())
    }

    fn args_with_config(dir: &TempDir, content: &str) -> ConvertArgs {
        let path = dir.path().join("config.ini");
        std::fs::write(&path, content).unwrap();
        ConvertArgs {
            input: dir.path().to_path_buf(),
            config: Some(path),
            ..ConvertArgs::default()
        }
    }

    #[test]
    fn test_defaults_without_flags() {
        let dir = TempDir::new().unwrap();
        let args = args_with_config(&dir, "");
        let config = resolve_config(&args, no_env).unwrap();
        assert_eq!(config.tile_budget, 50);
        assert!(config.dry_run);
        assert_eq!(config.geojson_path, Some(PathBuf::from(DEFAULT_GEOJSON)));
    }

    #[test]
    fn test_flags_override_file_and_env() {
        let dir = TempDir::new().unwrap();
        let mut args = args_with_config(&dir, "[convert]\ntile_budget = 10\nconcurrency = 3\n");
        args.max_tiles = Some(20);
        args.commit = true;
        args.docker = true;
        args.geojson = Some(PathBuf::from("cover.geojson"));

        let env = |name: &str| -> Result<String, ()> {
            match name {
                "TIFF_CONCURRENCY" => Ok("8".to_string()),
                _ => Err(()),
            }
        };
        let config = resolve_config(&args, env).unwrap();
        assert_eq!(config.tile_budget, 20);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.metadata_concurrency, 8);
        assert!(!config.dry_run);
        assert!(config.gdal.use_docker);
        assert_eq!(config.geojson_path, Some(PathBuf::from("cover.geojson")));
    }

    #[test]
    fn test_config_geojson_kept_without_flag() {
        let dir = TempDir::new().unwrap();
        let args = args_with_config(&dir, "[convert]\ngeojson = /tmp/cover.geojson\n");
        let config = resolve_config(&args, no_env).unwrap();
        assert_eq!(config.geojson_path, Some(PathBuf::from("/tmp/cover.geojson")));
    }

    #[test]
    fn test_zero_max_tiles_rejected() {
        let dir = TempDir::new().unwrap();
        let mut args = args_with_config(&dir, "");
        args.max_tiles = Some(0);
        assert!(matches!(
            resolve_config(&args, no_env),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let dir = TempDir::new().unwrap();
        let args = ConvertArgs {
            input: dir.path().to_path_buf(),
            config: Some(dir.path().join("missing.ini")),
            ..ConvertArgs::default()
        };
        assert!(resolve_config(&args, no_env).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(RunOutcome::Success), 0);
        assert_eq!(exit_code(RunOutcome::PartialFailure), 2);
        assert_eq!(exit_code(RunOutcome::Cancelled), 130);
    }

    #[test]
    fn test_resolve_input() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_input(dir.path()).is_ok());

        let file = dir.path().join("a.tif");
        std::fs::write(&file, b"").unwrap();
        assert!(matches!(resolve_input(&file), Err(CliError::Input(_))));
        assert!(resolve_input(&dir.path().join("missing")).is_err());
    }
}
