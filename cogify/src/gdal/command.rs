//! GDAL command lines.
//!
//! Commands are plain data: a tool name, its arguments, and the directories
//! the tool needs to see. Whether they run natively or inside a container is
//! decided by the runner.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::projection::{Epsg, GeoExtent};

/// Default container image for containerized GDAL.
pub const DEFAULT_CONTAINER: &str = "ghcr.io/osgeo/gdal";

/// Default container image tag.
pub const DEFAULT_CONTAINER_TAG: &str = "ubuntu-small-latest";

/// How GDAL tools are invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdalConfig {
    /// Run tools inside a container instead of from `PATH`.
    pub use_docker: bool,
    pub container: String,
    pub tag: String,
}

impl Default for GdalConfig {
    fn default() -> Self {
        Self {
            use_docker: false,
            container: DEFAULT_CONTAINER.to_string(),
            tag: DEFAULT_CONTAINER_TAG.to_string(),
        }
    }
}

impl GdalConfig {
    /// Full image reference, `container:tag`.
    pub fn image(&self) -> String {
        format!("{}:{}", self.container, self.tag)
    }

    /// Program and argument list that executes `command` under this config.
    pub fn invocation(&self, command: &GdalCommand) -> (String, Vec<String>) {
        if !self.use_docker {
            return (command.tool.clone(), command.args.clone());
        }

        let mut args = vec!["run".to_string(), "--rm".to_string()];
        for mount in &command.mounts {
            let mount = mount.display();
            args.push("-v".to_string());
            args.push(format!("{}:{}", mount, mount));
        }
        args.push(self.image());
        args.push(command.tool.clone());
        args.extend(command.args.iter().cloned());
        ("docker".to_string(), args)
    }

    /// Command line as it would be typed in a shell, for logging.
    pub fn command_line(&self, command: &GdalCommand) -> String {
        let (program, args) = self.invocation(command);
        std::iter::once(program)
            .chain(args)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single invocation of a GDAL tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdalCommand {
    tool: String,
    args: Vec<String>,
    mounts: Vec<PathBuf>,
}

impl GdalCommand {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: Vec::new(),
            mounts: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Creation option, `-co KEY=VALUE`.
    pub fn creation_option(self, key: &str, value: impl fmt::Display) -> Self {
        self.arg("-co").arg(format!("{}={}", key, value))
    }

    pub fn path(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    /// Makes `dir` visible to the tool when it runs in a container.
    pub fn mount(mut self, dir: &Path) -> Self {
        let dir = dir.to_path_buf();
        if !self.mounts.contains(&dir) {
            self.mounts.push(dir);
        }
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn mounts(&self) -> &[PathBuf] {
        &self.mounts
    }
}

impl fmt::Display for GdalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tool)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `gdalbuildvrt` over every source, adding an alpha band and hiding nodata.
pub fn build_vrt(output: &Path, sources: &[PathBuf]) -> GdalCommand {
    let mut command = GdalCommand::new("gdalbuildvrt")
        .args(["-addalpha", "-hidenodata"])
        .path(output)
        .mount(&parent_dir(output));
    for source in sources {
        command = command.path(source).mount(&parent_dir(source));
    }
    command
}

/// `gdalwarp` of a mosaic into a pseudo-Mercator virtual raster.
pub fn warp_vrt(input: &Path, output: &Path) -> GdalCommand {
    GdalCommand::new("gdalwarp")
        .args(["-of", "VRT", "-multi", "-wo", "NUM_THREADS=ALL_CPUS"])
        .arg("-t_srs")
        .arg(Epsg::Google.to_string())
        .path(input)
        .path(output)
        .mount(&parent_dir(input))
        .mount(&parent_dir(output))
}

/// Parameters of one cloud-optimized GeoTIFF extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateOptions<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    /// Clip window in pseudo-Mercator meters.
    pub clip: &'a GeoExtent,
    pub tile_size: u32,
    /// Overview levels aligned to the tile grid.
    pub aligned_levels: u8,
}

/// `gdal_translate` of a Mercator-clipped window into a COG.
pub fn translate_cog(options: &TranslateOptions<'_>) -> GdalCommand {
    let clip = options.clip;
    let mut command = GdalCommand::new("gdal_translate")
        .args(["-of", "COG", "-stats"])
        .creation_option("NUM_THREADS", "ALL_CPUS")
        .creation_option("BIGTIFF", "IF_NEEDED")
        .creation_option("ADD_ALPHA", "YES")
        .creation_option("COMPRESS", "WEBP")
        .creation_option("QUALITY", 90)
        .creation_option("RESAMPLING", "BILINEAR")
        .creation_option("OVERVIEW_RESAMPLING", "LANCZOS")
        .creation_option("TILING_SCHEME", "GoogleMapsCompatible")
        .creation_option("BLOCKSIZE", options.tile_size);
    if options.aligned_levels > 0 {
        command = command.creation_option("ALIGNED_LEVELS", options.aligned_levels);
    }
    command
        .arg("-projwin")
        .args([
            clip.min_x().to_string(),
            clip.max_y().to_string(),
            clip.max_x().to_string(),
            clip.min_y().to_string(),
        ])
        .arg("-projwin_srs")
        .arg(Epsg::Google.to_string())
        .path(options.input)
        .path(options.output)
        .mount(&parent_dir(options.input))
        .mount(&parent_dir(options.output))
}

/// `gdalinfo -json` for metadata extraction.
pub fn info_json(input: &Path) -> GdalCommand {
    GdalCommand::new("gdalinfo")
        .arg("-json")
        .path(input)
        .mount(&parent_dir(input))
}
