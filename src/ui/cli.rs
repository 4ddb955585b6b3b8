//! Command-line interface implementation

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use crate::config::Settings;

/// Command-line arguments for soundbridge
#[derive(Parser, Debug)]
#[command(author, version, about = "Audio playback bridge speaking JSON lines on stdin/stdout", long_about = None)]
pub struct Args {
    /// ALSA device to use (overrides the config file)
    #[arg(short = 'd', long, env = "SOUNDBRIDGE_ALSA_DEVICE")]
    pub alsa_device: Option<String>,

    /// Directory bundle resources are resolved against
    #[arg(short, long, env = "SOUNDBRIDGE_BUNDLE_DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// Resume tick interval in milliseconds; 0 leaves ticking to the host
    #[arg(long, env = "SOUNDBRIDGE_RESUME_TICK_MS")]
    pub resume_tick_ms: Option<u64>,

    /// Emit logs as JSON on stderr
    #[arg(long, env = "SOUNDBRIDGE_LOG_JSON")]
    pub log_json: bool,

    /// Write the effective settings back to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Config file path
    #[arg(short, long, env = "SOUNDBRIDGE_CONFIG")]
    pub config: Option<String>,
}

impl Args {
    /// Applies command-line overrides on top of file settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(device) = &self.alsa_device {
            settings.alsa_device = device.clone();
        }
        if let Some(dir) = &self.bundle_dir {
            settings.bundle_dir = dir.clone();
        }
        if let Some(ms) = self.resume_tick_ms {
            settings.resume_tick_ms = if ms == 0 { None } else { Some(ms) };
        }
    }
}

/// CLI front end: argument access and error reporting on stderr
pub struct Cli {
    pub args: Args,
}

impl Cli {
    /// Create a new CLI instance
    pub fn new() -> Self {
        Cli {
            args: Args::parse(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        match &self.args.config {
            Some(path) => PathBuf::from(path),
            None => Settings::default_path(),
        }
    }

    /// Display error messages
    pub fn display_error(&self, error: &dyn Error) {
        eprintln!("Error: {}", error);
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
