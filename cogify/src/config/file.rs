//! INI configuration file at `~/.cogify/config.ini`.
//!
//! ```ini
//! [convert]
//! tile_budget = 50
//! concurrency = 4
//! output_dir = ~/cogs
//!
//! [gdal]
//! docker = true
//! container = ghcr.io/osgeo/gdal
//! tag = ubuntu-small-latest
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};

use super::{ConfigError, ConvertConfig};

/// Path to the config directory (`~/.cogify`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cogify")
}

/// Path to the config file (`~/.cogify/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Overlays the INI file at `path` onto `base`.
///
/// A missing file leaves `base` unchanged.
pub fn load_config_file(path: &Path, base: ConvertConfig) -> Result<ConvertConfig, ConfigError> {
    if !path.exists() {
        return Ok(base);
    }
    let ini = Ini::load_from_file(path)?;
    parse_config(&ini, base)
}

/// Overlays parsed INI values onto `base`.
pub fn parse_config(ini: &Ini, base: ConvertConfig) -> Result<ConvertConfig, ConfigError> {
    let mut config = base;

    // [convert] section
    if let Some(section) = ini.section(Some("convert")) {
        if let Some(v) = parse_field(section, "convert", "tile_size", "expected a pixel count")? {
            config.tile_size = v;
        }
        if let Some(v) = parse_field(section, "convert", "tile_budget", "expected a tile count")? {
            config.tile_budget = v;
        }
        if let Some(v) = parse_field(section, "convert", "max_zoom", "expected a zoom level")? {
            config.max_zoom = Some(v);
        }
        if let Some(v) = parse_field(section, "convert", "concurrency", "expected a job count")? {
            config.concurrency = v;
        }
        if let Some(v) = parse_field(
            section,
            "convert",
            "metadata_concurrency",
            "expected a job count",
        )? {
            config.metadata_concurrency = v;
        }
        if let Some(v) = section.get("commit") {
            config.dry_run = !parse_bool(v);
        }
        if let Some(v) = non_empty(section, "output_dir") {
            config.output_dir = Some(expand_tilde(v));
        }
        if let Some(v) = non_empty(section, "output_extension") {
            config.output_extension = v.trim_start_matches('.').to_string();
        }
        if let Some(v) = non_empty(section, "geojson") {
            config.geojson_path = Some(expand_tilde(v));
        }
    }

    // [gdal] section
    if let Some(section) = ini.section(Some("gdal")) {
        if let Some(v) = section.get("docker") {
            config.gdal.use_docker = parse_bool(v);
        }
        if let Some(v) = non_empty(section, "container") {
            config.gdal.container = v.to_string();
        }
        if let Some(v) = non_empty(section, "tag") {
            config.gdal.tag = v.to_string();
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_field<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigError> {
    match non_empty(section, key) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: section_name.to_string(),
                key: key.to_string(),
                value: v.to_string(),
                reason: reason.to_string(),
            }),
    }
}

/// Parse a boolean value from string.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConvertConfig, ConfigError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_config(&ini, ConvertConfig::default())
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with(".cogify/config.ini"));
    }

    #[test]
    fn test_missing_file_keeps_base() {
        let dir = TempDir::new().unwrap();
        let base = ConvertConfig::default().with_tile_budget(7);
        let config = load_config_file(&dir.path().join("config.ini"), base.clone()).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[convert]\ntile_budget = 12\nconcurrency = 2\ncommit = yes\n\n[gdal]\ndocker = true\ntag = 3.8\n",
        )
        .unwrap();

        let config = load_config_file(&path, ConvertConfig::default()).unwrap();
        assert_eq!(config.tile_budget, 12);
        assert_eq!(config.concurrency, 2);
        assert!(!config.dry_run);
        assert!(config.gdal.use_docker);
        assert_eq!(config.gdal.tag, "3.8");
        // Untouched keys keep their defaults
        assert_eq!(config.metadata_concurrency, 5);
        assert_eq!(config.gdal.container, ConvertConfig::default().gdal.container);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = load("[convert]\noutput_dir =\n[gdal]\ncontainer = \n").unwrap();
        assert_eq!(config.output_dir, None);
        assert_eq!(config.gdal.container, ConvertConfig::default().gdal.container);
    }

    #[test]
    fn test_paths_and_extension() {
        let config = load("[convert]\noutput_dir = /srv/cog\noutput_extension = .tif\ngeojson = out.geojson\nmax_zoom = 14\n").unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/srv/cog")));
        assert_eq!(config.output_extension, "tif");
        assert_eq!(config.geojson_path, Some(PathBuf::from("out.geojson")));
        assert_eq!(config.max_zoom, Some(14));
    }

    #[test]
    fn test_invalid_number() {
        let err = load("[convert]\ntile_budget = lots\n").unwrap_err();
        match err {
            ConfigError::InvalidValue {
                section, key, value, ..
            } => {
                assert_eq!(section, "convert");
                assert_eq!(key, "tile_budget");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_zoom_is_invalid() {
        assert!(load("[convert]\nmax_zoom = -1\n").is_err());
    }

    #[test]
    fn test_parse_bool() {
        for value in ["true", "1", "yes", "on", " TRUE "] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["false", "0", "no", "off", ""] {
            assert!(!parse_bool(value), "{value}");
        }
    }
}
