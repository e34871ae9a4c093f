use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{
    model::{Coordinates, PermissionStatus, Unit},
    provider::openweather::{DEFAULT_GEO_URL, DEFAULT_WEATHER_URL},
};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "WEATHERDASH_API_KEY";

/// Base URLs of the weather provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub weather_url: String,
    pub geo_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            geo_url: DEFAULT_GEO_URL.to_string(),
        }
    }
}

/// Device location as known to this machine, plus the user's consent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub permission: PermissionStatus,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            permission: PermissionStatus::Prompt,
        }
    }
}

impl LocationConfig {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude?, self.longitude?))
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_city = "London"
///
/// [location]
/// latitude = 51.5
/// longitude = -0.12
/// permission = "granted"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,

    /// City shown when location is blocked or fails at startup.
    pub default_city: String,

    /// Unit used until the user picks one.
    pub default_unit: Unit,

    pub http_timeout_secs: u64,

    /// Upper bound on a single device position request.
    pub geolocation_timeout_ms: u64,

    /// Upper bound on the whole "use my location" attempt at startup.
    pub startup_location_timeout_ms: u64,

    pub location: LocationConfig,

    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            default_city: "London".to_string(),
            default_unit: Unit::Metric,
            http_timeout_secs: 30,
            geolocation_timeout_ms: 10_000,
            startup_location_timeout_ms: 5_000,
            location: LocationConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Return the API key or a hint on how to configure one.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured.\n\
                     Hint: run `weatherdash configure` or set {API_KEY_ENV}."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    /// The `WEATHERDASH_API_KEY` environment variable wins over the stored key.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                tracing::debug!("Using API key from {API_KEY_ENV}");
                cfg.api_key = Some(key);
            }
        }

        Ok(cfg)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
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

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Path to the persisted dashboard state (history, favorites, preferences).
    pub fn state_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("state.json"))
    }

    pub fn geolocation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.geolocation_timeout_ms)
    }

    pub fn startup_location_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.startup_location_timeout_ms)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weatherdash", "weatherdash")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
