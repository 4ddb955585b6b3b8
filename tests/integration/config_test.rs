//! Integration tests for configuration management
//!
//! These tests verify that the configuration system works correctly
//! across module boundaries.

use soundbridge::config::{ConfigError, Settings};
use soundbridge::coordinator::OutputRoute;
use soundbridge::ui::Args;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tempfile::tempdir;

#[cfg(test)]
mod config_integration_tests {
    use super::*;

    /// Test complete configuration workflow
    #[test]
    fn test_config_lifecycle() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let mut settings = Settings::default();
        settings.alsa_device = "test-audio-device".to_string();
        settings.bundle_dir = dir.path().join("sounds");
        settings.speaker_volume = 0.6;
        settings.available_routes = vec![OutputRoute::Speaker];
        settings.interruption_countdown = 4;

        settings.validate()?;
        settings.save(&config_path)?;

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded, settings);

        // Command-line overrides win over the file
        let args = Args::try_parse_from(["soundbridge", "--alsa-device", "hw:0", "--bundle-dir", "/srv/sounds"])?;
        let mut effective = loaded;
        args.apply_to(&mut effective);
        effective.validate()?;
        assert_eq!(effective.alsa_device, "hw:0");
        assert_eq!(effective.bundle_dir, PathBuf::from("/srv/sounds"));

        // The runtime configuration follows the settings
        let config = effective.coordinator_config();
        assert_eq!(config.volume.active_route(), OutputRoute::Speaker);
        assert!((config.volume.volume() - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.resume.countdown, 4);

        Ok(())
    }

    #[test]
    fn test_invalid_file_values_fail_validation() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"headphone_volume": 2.0}"#)?;

        let loaded = Settings::load(&config_path)?;
        assert!(matches!(loaded.validate(), Err(ConfigError::ValidationError(_))));
        Ok(())
    }

    #[test]
    fn test_unknown_route_is_parse_error() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"initial_route": "bluetooth"}"#)?;

        assert!(matches!(Settings::load(&config_path), Err(ConfigError::ParseError(_))));
        Ok(())
    }
}
