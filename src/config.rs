use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_BASE_URL;
use crate::models::{Interval, TimeRange};
use crate::pipeline::ViewSelection;

/// Environment variable that overrides `base_url`
pub const BASE_URL_ENV: &str = "PUFFER_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: Option<u64>,
    pub default_range: TimeRange,
    pub default_interval: Interval,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            default_range: TimeRange::AllTime,
            default_interval: Interval::Minute,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn default_selection(&self) -> ViewSelection {
        ViewSelection::new(self.default_range, self.default_interval)
    }

    /// Apply the environment and command-line overrides, command line last
    pub fn with_overrides(mut self, env_url: Option<String>, cli_url: Option<String>) -> Self {
        if let Some(url) = cli_url.or(env_url).filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        self
    }
}

/// Read `config.toml`. A missing file is not an error; defaults are used instead.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let config_str = toml::to_string_pretty(config)?;
    fs::write(path, config_str)
        .with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = load_config(&dir.path().join("config.toml"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.request_timeout(), None);
        Ok(())
    }

    #[test]
    fn test_load_partial_config() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            base_url = "http://tracker.local:8080"
            default_range = "24h"
            default_interval = "hour"
            request_timeout_secs = 5
            "#,
        )?;

        let config = load_config(&path)?;
        assert_eq!(config.base_url, "http://tracker.local:8080");
        assert_eq!(
            config.default_selection(),
            ViewSelection::new(TimeRange::Last24Hours, Interval::Hour)
        );
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        Ok(())
    }

    #[test]
    fn test_unknown_interval_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_interval = \"second\"\n")?;

        assert!(load_config(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        let config = Config {
            default_range: TimeRange::LastWeek,
            default_interval: Interval::Day,
            ..Config::default()
        };

        save_config(&config, &path)?;
        assert_eq!(load_config(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_override_precedence() {
        let base = Config::default();

        let from_env = base.clone().with_overrides(Some("http://env:1".to_string()), None);
        assert_eq!(from_env.base_url, "http://env:1");

        let from_cli = base
            .clone()
            .with_overrides(Some("http://env:1".to_string()), Some("http://cli:2".to_string()));
        assert_eq!(from_cli.base_url, "http://cli:2");

        let blank = base.clone().with_overrides(Some("  ".to_string()), None);
        assert_eq!(blank.base_url, DEFAULT_BASE_URL);
    }
}
