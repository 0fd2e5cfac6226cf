//! Command line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "usb-watchdog")]
#[command(
    author,
    version,
    about = "USB Watchdog - Keep a USB hardware watchdog from resetting this host"
)]
#[command(long_about = "
Pings a USB hardware watchdog module at a fixed interval so it does not
power-cycle the host. Survives the module being unplugged and replugged.

EXAMPLES:
    # Ping every 10 seconds (default)
    usb-watchdog

    # Ping every 60 seconds with debug output
    usb-watchdog --interval 60 --debug

    # Ask the module to restart the host right now
    usb-watchdog --restart

    # Run under systemd
    usb-watchdog --systemd --quiet

CONFIGURATION:
    Settings are read from the first of:
    1. Path specified with --config
    2. ~/.config/usb-watchdog/watchdog.toml
    3. /etc/usb-watchdog/watchdog.toml
    4. Built-in defaults
    Command line flags override file values.
")]
pub struct Args {
    /// Watchdog ping interval in seconds, 1 to 229 [default: 10]
    #[arg(short, long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// USB vendor id in hex [default: 5131]
    #[arg(short = 'u', long = "usbvendor", value_name = "HEX")]
    pub usb_vendor: Option<String>,

    /// USB product id in hex [default: 2007]
    #[arg(short = 'p', long = "usbproduct", value_name = "HEX")]
    pub usb_product: Option<String>,

    /// Send the restart command to the USB watchdog device and exit
    #[arg(short, long)]
    pub restart: bool,

    /// Silence all output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output debug info
    #[arg(short, long)]
    pub debug: bool,

    /// Format logs for the systemd journal
    #[arg(long)]
    pub systemd: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    pub save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_short_flags() {
        let args =
            Args::try_parse_from(["usb-watchdog", "-i", "5", "-u", "1a86", "-p", "7523", "-rqd"])
                .unwrap();
        assert_eq!(args.interval, Some(5));
        assert_eq!(args.usb_vendor.as_deref(), Some("1a86"));
        assert_eq!(args.usb_product.as_deref(), Some("7523"));
        assert!(args.restart && args.quiet && args.debug);
        assert!(!args.systemd);
    }

    #[test]
    fn test_negative_interval_parses_for_validation() {
        let args = Args::try_parse_from(["usb-watchdog", "--interval", "-3"]).unwrap();
        assert_eq!(args.interval, Some(-3));
    }

    #[test]
    fn test_non_numeric_interval_is_usage_error() {
        assert!(Args::try_parse_from(["usb-watchdog", "-i", "soon"]).is_err());
    }

    #[test]
    fn test_help_is_not_an_error_exit() {
        let err = Args::try_parse_from(["usb-watchdog", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());
    }
}
