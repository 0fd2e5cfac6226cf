//! End-to-end checks of the `usb-watchdog` binary that never reach the device
//!
//! Invalid settings must be rejected before any USB activity, so these run
//! on machines without the module or libusb permissions.

use std::process::{Command, Output};
use tempfile::TempDir;

fn run(args: &[&str]) -> Output {
    // Keep any real user configuration out of the way
    let config_home = TempDir::new().unwrap();
    Command::new(env!("CARGO_BIN_EXE_usb-watchdog"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("binary should start")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

mod interval {
    use super::*;

    #[test]
    fn test_zero_interval_rejected_on_stdout() {
        let output = run(&["-i", "0"]);

        assert_eq!(output.status.code(), Some(1));
        let out = stdout(&output);
        assert!(out.contains("The interval specified 0 is not between 1 and 229"));
        assert!(out.trim_end().ends_with("exiting..."));
        assert!(!stderr(&output).contains("not between"));
    }

    #[test]
    fn test_interval_above_bound_rejected() {
        let output = run(&["--interval", "230"]);

        assert_eq!(output.status.code(), Some(1));
        assert!(stdout(&output).contains("The interval specified 230 is not between 1 and 229"));
    }

    #[test]
    fn test_negative_interval_rejected() {
        let output = run(&["-i", "-1"]);

        assert_eq!(output.status.code(), Some(1));
        assert!(stdout(&output).contains("exiting..."));
    }
}

mod usage {
    use super::*;

    #[test]
    fn test_help_exits_zero() {
        let output = run(&["-h"]);

        assert_eq!(output.status.code(), Some(0));
        assert!(stdout(&output).contains("--usbvendor"));
    }

    #[test]
    fn test_unknown_flag_exits_one() {
        let output = run(&["--no-such-flag"]);

        assert_eq!(output.status.code(), Some(1));
        assert!(!stderr(&output).is_empty());
    }

    #[test]
    fn test_bad_vendor_id_rejected() {
        let output = run(&["-u", "nothex"]);

        assert_eq!(output.status.code(), Some(1));
        assert!(stdout(&output).contains("exiting..."));
    }
}
