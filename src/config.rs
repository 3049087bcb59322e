use crate::layout::{LayoutMetrics, DEFAULT_PIXELS_PER_QUARTER_HOUR};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Settings from `config.toml`; every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Height of a quarter hour in the time grid.
    pub pixels_per_quarter_hour: f32,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub api_base: String,
    pub calendar_id: String,
    /// Upper bound on remote events fetched per import
    pub max_results: u32,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pixels_per_quarter_hour: DEFAULT_PIXELS_PER_QUARTER_HOUR,
            import: ImportConfig::default(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            api_base: GOOGLE_CALENDAR_API.to_string(),
            calendar_id: "primary".to_string(),
            max_results: 250,
            timeout_secs: 15,
        }
    }
}

impl Config {
    pub fn layout_metrics(&self) -> LayoutMetrics {
        LayoutMetrics {
            pixels_per_quarter_hour: self.pixels_per_quarter_hour,
        }
    }
}

impl ImportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Platform config file, e.g. `~/.config/weekgrid/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "weekgrid").context("locating config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

/// Reads `path`, or returns defaults when it does not exist.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    anyhow::ensure!(
        config.pixels_per_quarter_hour > 0.0,
        "pixels_per_quarter_hour must be positive in {}",
        path.display()
    );
    Ok(config)
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config_from(path),
        None => load_config_from(&config_path()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.pixels_per_quarter_hour, 12.0);
        assert_eq!(config.import.calendar_id, "primary");
        assert_eq!(config.import.max_results, 250);
        assert_eq!(config.import.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[import]\nmax_results = 20\n").unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.import.max_results, 20);
        assert_eq!(config.import.api_base, GOOGLE_CALENDAR_API);
        assert_eq!(config.layout_metrics().hour_height(), 48.0);
    }

    #[test]
    fn rejects_bad_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "pixels_per_quarter_hour = 0.0\n").unwrap();
        assert!(load_config_from(&path).is_err());
        fs::write(&path, "pixels_per_quarter_hour = \"big\"\n").unwrap();
        assert!(load_config_from(&path).is_err());
    }
}
