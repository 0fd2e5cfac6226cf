//! Integration tests for configuration loading
//!
//! Covers:
//! - Config files with all, some and no sections
//! - Command line flags layered over file values
//! - Interval bounds
//! - Invalid configuration handling

use clap::Parser;
use std::time::Duration;
use watchdog::cli::Args;
use watchdog::config::{MAX_INTERVAL_SECS, MIN_INTERVAL_SECS, validate_interval};
use watchdog::{Error, Mode, Settings, WatchdogConfig};

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("usb-watchdog").chain(argv.iter().copied()))
        .expect("arguments should parse")
}

mod config_file {
    use super::*;
    use protocol::DeviceIdentity;
    use std::fs;
    use tempfile::TempDir;

    const FULL_CONFIG: &str = r#"
[device]
vendor_id = "0x1a86"
product_id = "7523"

[watchdog]
interval_secs = 60
restart = false

[logging]
level = "warn"
systemd = true
"#;

    const PARTIAL_CONFIG: &str = r#"
[watchdog]
interval_secs = 30
"#;

    #[test]
    fn test_parse_full_config() {
        let config: WatchdogConfig = toml::from_str(FULL_CONFIG).unwrap();
        let settings = Settings::resolve(&args(&[]), &config).unwrap();

        assert_eq!(settings.identity, DeviceIdentity::new(0x1A86, 0x7523));
        assert_eq!(settings.interval, Duration::from_secs(60));
        assert_eq!(settings.mode, Mode::Ping);
        assert_eq!(settings.log.level, "warn");
        assert!(settings.log.systemd);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: WatchdogConfig = toml::from_str(PARTIAL_CONFIG).unwrap();

        assert_eq!(config.watchdog.interval_secs, 30);
        assert_eq!(config.device, WatchdogConfig::default().device);
        assert_eq!(config.logging, WatchdogConfig::default().logging);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: WatchdogConfig = toml::from_str("").unwrap();
        assert_eq!(config, WatchdogConfig::default());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watchdog.toml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let (config, loaded) = WatchdogConfig::load_or_default(Some(&path)).unwrap();

        assert_eq!(loaded.as_deref(), Some(path.as_path()));
        assert_eq!(config.watchdog.interval_secs, 60);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let err = WatchdogConfig::load_or_default(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watchdog.toml");
        fs::write(&path, "[watchdog]\ninterval_secs = \"soon\"\n").unwrap();

        let err = WatchdogConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("watchdog.toml");

        let mut config = WatchdogConfig::default();
        config.watchdog.interval_secs = 45;
        config.save(&path).unwrap();

        assert_eq!(WatchdogConfig::load(&path).unwrap(), config);
    }
}

mod overrides {
    use super::*;

    #[test]
    fn test_flags_win_over_file() {
        let mut config = WatchdogConfig::default();
        config.watchdog.interval_secs = 200;
        config.logging.level = "error".to_string();

        let settings = Settings::resolve(&args(&["--interval", "15", "--quiet"]), &config).unwrap();

        assert_eq!(settings.interval, Duration::from_secs(15));
        assert!(settings.log.quiet);
        assert_eq!(settings.log.directive(), "off");
    }

    #[test]
    fn test_restart_from_either_source() {
        let settings = Settings::resolve(&args(&["-r"]), &WatchdogConfig::default()).unwrap();
        assert_eq!(settings.mode, Mode::Restart);

        let mut config = WatchdogConfig::default();
        config.watchdog.restart = true;
        let settings = Settings::resolve(&args(&[]), &config).unwrap();
        assert_eq!(settings.mode, Mode::Restart);
    }

    #[test]
    fn test_invalid_file_interval_rejected() {
        let mut config = WatchdogConfig::default();
        config.watchdog.interval_secs = 0;

        let err = Settings::resolve(&args(&[]), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_valid_flag_rescues_invalid_file_interval() {
        let mut config = WatchdogConfig::default();
        config.watchdog.interval_secs = 999;

        assert!(Settings::resolve(&args(&["-i", "5"]), &config).is_ok());
    }

    #[test]
    fn test_product_id_too_long_rejected() {
        let err =
            Settings::resolve(&args(&["-p", "0x12345"]), &WatchdogConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

mod interval_bounds {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn accepted_inside_range(secs in MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS) {
            let interval = validate_interval(secs).unwrap();
            prop_assert_eq!(interval, Duration::from_secs(secs as u64));
        }

        #[test]
        fn rejected_below_range(secs in i64::MIN..MIN_INTERVAL_SECS) {
            prop_assert!(validate_interval(secs).is_err());
        }

        #[test]
        fn rejected_above_range(secs in (MAX_INTERVAL_SECS + 1)..i64::MAX) {
            prop_assert!(validate_interval(secs).is_err());
        }
    }
}
