//! Tests for configuration management module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::coordinator::OutputRoute;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.alsa_device, "default");
        assert_eq!(settings.bundle_dir, PathBuf::from("."));
        assert_eq!(settings.speaker_volume, 1.0);
        assert_eq!(settings.headphone_volume, 1.0);
        assert_eq!(settings.initial_route, OutputRoute::Speaker);
        assert_eq!(settings.interruption_countdown, 2);
        assert_eq!(settings.max_resume_retries, 3);
        assert_eq!(settings.resume_tick_ms, Some(1000));
        assert!(!settings.mix_with_others);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("nested").join("config.json");

        let mut settings = Settings::default();
        settings.alsa_device = "hw:1,0".to_string();
        settings.bundle_dir = PathBuf::from("/usr/share/sounds");
        settings.headphone_volume = 0.4;
        settings.resume_tick_ms = None;

        settings.save(&config_path)?;
        assert!(config_path.exists());

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded, settings);
        Ok(())
    }

    #[test]
    fn test_missing_file_gives_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let loaded = Settings::load(&dir.path().join("absent.json"))?;
        assert_eq!(loaded, Settings::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"alsa_device": "plughw:0", "initial_route": "headphone"}"#)?;

        let loaded = Settings::load(&config_path)?;
        assert_eq!(loaded.alsa_device, "plughw:0");
        assert_eq!(loaded.initial_route, OutputRoute::Headphone);
        assert_eq!(loaded.interruption_countdown, 2);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ not json")?;
        assert!(matches!(Settings::load(&config_path), Err(ConfigError::ParseError(_))));
        Ok(())
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.speaker_volume = 1.5;
        assert!(matches!(settings.validate(), Err(ConfigError::ValidationError(_))));

        let mut settings = Settings::default();
        settings.alsa_device = "  ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.available_routes = vec![OutputRoute::Speaker];
        settings.initial_route = OutputRoute::Headphone;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.resume_tick_ms = Some(u64::MAX);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_resume_tick_leaves_ticking_to_host() {
        let mut settings = Settings::default();
        settings.resume_tick_ms = Some(0);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.service_options().resume_tick, None);

        settings.resume_tick_ms = Some(MAX_RESUME_TICK_MS);
        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.service_options().resume_tick,
            Some(Duration::from_millis(MAX_RESUME_TICK_MS))
        );
    }

    #[test]
    fn test_derived_runtime_config() {
        let mut settings = Settings::default();
        settings.speaker_volume = 0.3;
        settings.headphone_volume = 0.7;
        settings.initial_route = OutputRoute::Headphone;
        settings.interruption_countdown = 5;
        settings.mix_with_others = true;
        settings.resume_tick_ms = Some(250);

        let config = settings.coordinator_config();
        assert!((config.volume.volume() - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.resume.countdown, 5);
        assert!(config.session.mix_with_others);

        let options = settings.service_options();
        assert_eq!(options.resume_tick, Some(Duration::from_millis(250)));
        assert_eq!(options.bundle_dir, PathBuf::from("."));
    }

    #[test]
    fn test_default_path() {
        let path = Settings::default_path();
        assert!(path.ends_with(".config/soundbridge/config.json"));
    }
}
