//! Application settings and configuration management

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::SessionOptions;
use crate::bridge::ServiceOptions;
use crate::coordinator::{CoordinatorConfig, OutputRoute, ResumePolicy, VolumeProfile};

/// Longest accepted resume tick interval (one minute).
pub const MAX_RESUME_TICK_MS: u64 = 60_000;

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// ALSA device to use for audio playback
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    /// Directory that bundle resources (`name.type`) are resolved against
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: PathBuf,
    #[serde(default = "default_volume")]
    pub speaker_volume: f32,
    #[serde(default = "default_volume")]
    pub headphone_volume: f32,
    /// Route active at startup
    #[serde(default = "default_route")]
    pub initial_route: OutputRoute,
    /// Routes the output device actually provides
    #[serde(default = "default_available_routes")]
    pub available_routes: Vec<OutputRoute>,
    /// Ticks between a call ending and playback resuming
    #[serde(default = "default_countdown")]
    pub interruption_countdown: u32,
    #[serde(default = "default_max_resume_retries")]
    pub max_resume_retries: u32,
    /// Interval of the built-in resume tick; `None` or 0 relies on host `tick` requests
    #[serde(default = "default_resume_tick_ms")]
    pub resume_tick_ms: Option<u64>,
    #[serde(default)]
    pub mix_with_others: bool,
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_bundle_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_volume() -> f32 {
    1.0
}

fn default_route() -> OutputRoute {
    OutputRoute::Speaker
}

fn default_available_routes() -> Vec<OutputRoute> {
    vec![OutputRoute::Speaker, OutputRoute::Headphone]
}

fn default_countdown() -> u32 {
    ResumePolicy::default().countdown
}

fn default_max_resume_retries() -> u32 {
    ResumePolicy::default().max_retries
}

fn default_resume_tick_ms() -> Option<u64> {
    Some(1000)
}

fn default_max_download_bytes() -> u64 {
    32 * 1024 * 1024
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            alsa_device: default_alsa_device(),
            bundle_dir: default_bundle_dir(),
            speaker_volume: default_volume(),
            headphone_volume: default_volume(),
            initial_route: default_route(),
            available_routes: default_available_routes(),
            interruption_countdown: default_countdown(),
            max_resume_retries: default_max_resume_retries(),
            resume_tick_ms: default_resume_tick_ms(),
            mix_with_others: false,
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("soundbridge").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alsa_device.trim().is_empty() {
            return Err(ConfigError::ValidationError("ALSA device cannot be empty".to_string()));
        }

        for (name, level) in [("speaker_volume", self.speaker_volume), ("headphone_volume", self.headphone_volume)] {
            if !(0.0..=1.0).contains(&level) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, level
                )));
            }
        }

        if self.available_routes.is_empty() {
            return Err(ConfigError::ValidationError("At least one output route must be available".to_string()));
        }
        if !self.available_routes.contains(&self.initial_route) {
            return Err(ConfigError::ValidationError(format!(
                "Initial route {} is not among the available routes",
                self.initial_route
            )));
        }

        if let Some(ms) = self.resume_tick_ms {
            if ms > MAX_RESUME_TICK_MS {
                return Err(ConfigError::ValidationError(format!(
                    "resume_tick_ms must be at most {}, got {}",
                    MAX_RESUME_TICK_MS, ms
                )));
            }
        }
        if self.max_download_bytes == 0 {
            return Err(ConfigError::ValidationError("max_download_bytes must be positive".to_string()));
        }

        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            volume: VolumeProfile::new(self.speaker_volume, self.headphone_volume, self.initial_route),
            resume: ResumePolicy {
                countdown: self.interruption_countdown,
                max_retries: self.max_resume_retries,
            },
            session: SessionOptions { mix_with_others: self.mix_with_others },
        }
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            bundle_dir: self.bundle_dir.clone(),
            max_download_bytes: self.max_download_bytes,
            resume_tick: self.resume_tick_ms.filter(|ms| *ms > 0).map(Duration::from_millis),
            ..ServiceOptions::default()
        }
    }
}
