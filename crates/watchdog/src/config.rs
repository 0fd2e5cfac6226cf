//! Watchdog configuration management
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, and command line flags. [`Settings::resolve`]
//! merges them and validates the result before any USB activity happens.

use crate::cli::Args;
use crate::logging::{LogSettings, VALID_LEVELS};
use crate::session::Mode;
use crate::{Error, Result};
use anyhow::Context;
use protocol::{DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID, DeviceIdentity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest allowed ping interval in seconds
pub const MIN_INTERVAL_SECS: i64 = 1;

/// Longest allowed ping interval in seconds
///
/// The module's countdown is a little under four minutes.
pub const MAX_INTERVAL_SECS: i64 = 229;

pub const DEFAULT_INTERVAL_SECS: i64 = 10;

/// On-disk configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub watchdog: PingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// USB vendor id, hex
    #[serde(default = "DeviceSettings::default_vendor_id")]
    pub vendor_id: String,
    /// USB product id, hex
    #[serde(default = "DeviceSettings::default_product_id")]
    pub product_id: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
        }
    }
}

impl DeviceSettings {
    fn default_vendor_id() -> String {
        format!("{:#06x}", DEFAULT_VENDOR_ID)
    }

    fn default_product_id() -> String {
        format!("{:#06x}", DEFAULT_PRODUCT_ID)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingSettings {
    /// Seconds between pings
    #[serde(default = "PingSettings::default_interval")]
    pub interval_secs: i64,
    /// Send a restart command instead of pinging
    #[serde(default)]
    pub restart: bool,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            interval_secs: Self::default_interval(),
            restart: false,
        }
    }
}

impl PingSettings {
    fn default_interval() -> i64 {
        DEFAULT_INTERVAL_SECS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
    /// Format output for the systemd journal
    #[serde(default)]
    pub systemd: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            systemd: false,
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl WatchdogConfig {
    /// Load configuration from `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: WatchdogConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the explicit file if given, else the first standard file found,
    /// else defaults
    ///
    /// Returns the path actually loaded so it can be logged once logging is up.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let path = expand_path(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        match Self::candidates().into_iter().find(|p| p.exists()) {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-watchdog").join("watchdog.toml")
        } else {
            PathBuf::from(".config/usb-watchdog/watchdog.toml")
        }
    }

    fn candidates() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/usb-watchdog/watchdog.toml"),
        ]
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Validated runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub identity: DeviceIdentity,
    pub interval: Duration,
    pub mode: Mode,
    pub log: LogSettings,
}

impl Settings {
    /// Merge command line flags over the file configuration and validate
    pub fn resolve(args: &Args, file: &WatchdogConfig) -> Result<Self> {
        let interval = validate_interval(args.interval.unwrap_or(file.watchdog.interval_secs))?;

        let vendor = args
            .usb_vendor
            .as_deref()
            .unwrap_or(&file.device.vendor_id);
        let product = args
            .usb_product
            .as_deref()
            .unwrap_or(&file.device.product_id);
        let identity = DeviceIdentity::from_hex(vendor, product)
            .map_err(|e| Error::Config(e.to_string()))?;

        let level = file.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}', must be one of: {}",
                file.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        let mode = if args.restart || file.watchdog.restart {
            Mode::Restart
        } else {
            Mode::Ping
        };

        Ok(Self {
            identity,
            interval,
            mode,
            log: LogSettings {
                level,
                quiet: args.quiet,
                debug: args.debug,
                systemd: args.systemd || file.logging.systemd,
            },
        })
    }
}

/// Check a ping interval against the allowed range
pub fn validate_interval(secs: i64) -> Result<Duration> {
    if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
        return Err(Error::Config(format!(
            "The interval specified {} is not between {} and {}",
            secs, MIN_INTERVAL_SECS, MAX_INTERVAL_SECS
        )));
    }

    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|e| Error::Config(format!("Invalid interval {}: {}", secs, e)))
}
