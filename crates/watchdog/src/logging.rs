//! Logging setup and configuration

use crate::{Error, Result};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Valid values for the `level` setting
pub const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Identifier journal entries are tagged with
pub const SYSLOG_IDENTIFIER: &str = "usb_watchdog";

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

/// How log output should be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Base level when neither `--debug` nor `RUST_LOG` applies
    pub level: String,
    /// Suppress all output
    pub quiet: bool,
    /// Force debug output
    pub debug: bool,
    /// Log to the systemd journal instead of an interactive console
    pub systemd: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            quiet: false,
            debug: false,
            systemd: false,
        }
    }
}

impl LogSettings {
    /// Filter directive used when `RUST_LOG` does not apply
    pub fn directive(&self) -> &str {
        if self.quiet {
            "off"
        } else if self.debug {
            "debug"
        } else {
            &self.level
        }
    }
}

/// Build the level filter
///
/// `--quiet` and `--debug` win over `RUST_LOG`, which wins over the
/// configured level.
pub fn build_filter(settings: &LogSettings, rust_log: Option<&str>) -> Result<EnvFilter> {
    let directive = match rust_log.map(str::trim) {
        Some(env) if !env.is_empty() && !settings.quiet && !settings.debug => env,
        _ => settings.directive(),
    };

    EnvFilter::try_new(directive).map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Handle to the installed subscriber
///
/// Lets the fatal-error path mute console output after it has printed its
/// own diagnostic.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    systemd: bool,
}

impl LogHandle {
    /// Stop console output, keeping errors flowing when logging to the journal
    pub fn silence_console(&self) {
        let directive = if self.systemd { "error" } else { "off" };
        if let Err(e) = self
            .filter
            .modify(|filter| *filter = EnvFilter::new(directive))
        {
            eprintln!("Failed to adjust log filter: {}", e);
        }
    }
}

/// Connect to journald, or `None` if it is not reachable
fn journald_layer() -> Option<tracing_journald::Layer> {
    match tracing_journald::layer() {
        Ok(layer) => Some(layer.with_syslog_identifier(SYSLOG_IDENTIFIER.to_string())),
        Err(e) => {
            eprintln!(
                "Failed to connect to journald at {} ({}), logging to stderr",
                JOURNALD_SOCKET, e
            );
            None
        }
    }
}

/// Setup tracing subscriber for the application
pub fn setup_logging(settings: &LogSettings) -> Result<LogHandle> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(settings, rust_log.as_deref())?;
    let (filter, handle) = reload::Layer::new(filter);

    let journald = settings.systemd.then(journald_layer).flatten();
    // Plain lines on stderr still end up in the journal for a systemd unit
    let fallback_layer = (settings.systemd && journald.is_none()).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(false)
            .without_time()
    });
    let console_layer = (!settings.systemd).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(fallback_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))?;

    Ok(LogHandle {
        filter: handle,
        systemd: settings.systemd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(quiet: bool, debug: bool) -> LogSettings {
        LogSettings {
            level: "warn".to_string(),
            quiet,
            debug,
            ..LogSettings::default()
        }
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(LogSettings::default().directive(), "info");
    }

    #[test]
    fn test_debug_overrides_level() {
        assert_eq!(settings(false, true).directive(), "debug");
    }

    #[test]
    fn test_quiet_wins() {
        assert_eq!(settings(true, true).directive(), "off");
    }

    #[test]
    fn test_rust_log_overrides_configured_level() {
        let filter = build_filter(&settings(false, false), Some("trace")).unwrap();
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    fn test_debug_flag_beats_rust_log() {
        let filter = build_filter(&settings(false, true), Some("warn")).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_quiet_flag_beats_rust_log() {
        let filter = build_filter(&settings(true, false), Some("trace")).unwrap();
        assert_eq!(filter.to_string(), "off");
    }

    #[test]
    fn test_blank_rust_log_ignored() {
        let filter = build_filter(&settings(false, false), Some("  ")).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_journald_layer_matches_socket_presence() {
        // Without the socket the stderr fallback must be chosen
        if !std::path::Path::new(JOURNALD_SOCKET).exists() {
            assert!(journald_layer().is_none());
        }
        assert_eq!(SYSLOG_IDENTIFIER, "usb_watchdog");
    }
}
