use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::model::Unit;

/// Upstream services and transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// One-line address geocoder.
    pub geocoder_url: String,

    /// Geocoder benchmark (dataset version) parameter.
    pub benchmark: String,

    /// Base URL of the weather provider, without trailing slash.
    pub weather_api_url: String,

    /// The weather provider rejects requests without a User-Agent.
    pub user_agent: String,

    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            geocoder_url: "https://geocoding.geo.census.gov/geocoder/locations/onelineaddress"
                .to_string(),
            benchmark: "4".to_string(),
            weather_api_url: "https://api.weather.gov".to_string(),
            user_agent: concat!("forecast-cli/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// units = "metric"
/// debounce_ms = 500
///
/// [endpoints]
/// user_agent = "my-forecast (me@example.com)"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub units: Unit,

    /// Quiet period before typed input is resolved.
    pub debounce_ms: u64,

    /// Maximum number of addresses kept in search history.
    pub history_limit: usize,

    /// Lifetime of cached forecasts; absent means they never expire.
    pub cache_ttl_secs: Option<u64>,

    pub endpoints: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: Unit::default(),
            debounce_ms: 500,
            history_limit: 20,
            cache_ttl_secs: None,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Search history lives in the data dir, not next to the config.
    pub fn history_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?
            .data_dir()
            .join(crate::history::HISTORY_NAMESPACE)
            .with_extension("json"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "forecast", "forecast-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}
