//! Cogify CLI - cover a directory of GeoTIFFs with quad-key tiles and
//! convert each tile to a cloud-optimized GeoTIFF.

mod convert;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use convert::ConvertArgs;

#[derive(Parser, Debug)]
#[command(name = "cogify")]
#[command(version, about = "Cover a folder of GeoTIFFs with quad-key tiles and convert them to COGs")]
#[command(after_help = "Runs are dry runs unless --commit is given.")]
struct Cli {
    /// Directory containing the source .tif/.tiff files
    input: Option<PathBuf>,

    /// Maximum number of covering tiles [default: 50]
    max_tiles: Option<usize>,

    /// Run GDAL and write output (default is a dry run)
    #[arg(long)]
    commit: bool,

    /// Number of tiles converted in parallel [default: 4]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Finest zoom level to consider (defaults to the sources' resolution)
    #[arg(long)]
    max_zoom: Option<u8>,

    /// Where to write the coverage GeoJSON [default: ./output.geojson]
    #[arg(long)]
    geojson: Option<PathBuf>,

    /// Output directory [default: <input>/cog]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Run GDAL tools inside docker
    #[arg(long)]
    docker: bool,

    /// Config file [default: ~/.cogify/config.ini]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(input) = cli.input else {
        // Nothing to do; show usage and exit cleanly
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    let args = ConvertArgs {
        input,
        max_tiles: cli.max_tiles,
        commit: cli.commit,
        concurrency: cli.concurrency,
        max_zoom: cli.max_zoom,
        geojson: cli.geojson,
        output_dir: cli.output_dir,
        docker: cli.docker,
        config: cli.config,
        verbose: cli.verbose,
    };

    match convert::run(args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => e.exit(),
    }
}
