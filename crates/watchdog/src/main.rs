//! USB watchdog daemon
//!
//! Feeds a USB hardware watchdog module until interrupted, or sends it a
//! single restart command with `--restart`.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use watchdog::cli::Args;
use watchdog::logging::{LogHandle, setup_logging};
use watchdog::service::{self, SystemdNotifier};
use watchdog::usb::UsbLocator;
use watchdog::{
    Error, ReconnectSupervisor, SessionEnd, Settings, Shutdown, WatchdogConfig, exit_code,
};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if args.save_config {
        return match save_default_config() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    // Everything here must be valid before the device is touched
    let (settings, config_path) = match load_settings(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{:#}\nexiting...", e);
            return ExitCode::FAILURE;
        }
    };

    let log = match setup_logging(&settings.log).context("Failed to initialize logging") {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    if args.list_devices {
        return match list_devices_mode() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fatal_error(&log, &format!("{:#}", e)),
        };
    }

    run(&settings, &log)
}

fn save_default_config() -> Result<()> {
    let path = WatchdogConfig::default_path();
    WatchdogConfig::default().save(&path)?;
    println!("Configuration saved to: {}", path.display());
    Ok(())
}

fn load_settings(args: &Args) -> Result<(Settings, Option<std::path::PathBuf>)> {
    let (config, path) = WatchdogConfig::load_or_default(args.config.as_deref())?;
    let settings = Settings::resolve(args, &config)?;
    Ok((settings, path))
}

fn run(settings: &Settings, log: &LogHandle) -> ExitCode {
    let shutdown = Shutdown::new();
    if let Err(e) = shutdown.install_signal_handler() {
        return fatal_error(log, &e.to_string());
    }

    let locator = match UsbLocator::new() {
        Ok(locator) => locator,
        Err(e) => return fatal_error(log, &e.to_string()),
    };

    let notifier = SystemdNotifier::from_env();
    if let Some(timeout) = service::watchdog_timeout()
        && timeout <= settings.interval
    {
        warn!(
            "systemd WatchdogSec ({}s) is not longer than the ping interval ({}s)",
            timeout.as_secs(),
            settings.interval.as_secs()
        );
    }

    info!(
        "Watchdog module {} interval {}s mode {:?}",
        settings.identity,
        settings.interval.as_secs(),
        settings.mode
    );

    let result = ReconnectSupervisor::new(locator, shutdown, &notifier, settings).run();

    if let Err(e) = notifier.stopping() {
        warn!("Failed to notify systemd: {}", e);
    }

    match &result {
        Ok(SessionEnd::RestartSent { acknowledged }) => {
            if *acknowledged {
                info!("Restart command acknowledged");
            }
            ExitCode::from(exit_code(&result))
        }
        Err(Error::Interrupted) => fatal_error(log, "User pressed CTRL+C, aborting..."),
        Err(e) => fatal_error(log, &e.to_string()),
    }
}

/// Print the diagnostic, mute the console and fail
fn fatal_error(log: &LogHandle, message: &str) -> ExitCode {
    eprintln!("\nFATAL ERROR: {}", message);
    log.silence_console();
    error!("{}", message);
    ExitCode::FAILURE
}

fn list_devices_mode() -> Result<()> {
    info!("Listing USB devices...");

    let locator = UsbLocator::new()?;
    let devices = locator.list_devices()?;

    if devices.is_empty() {
        println!("No USB devices found.");
    } else {
        println!("Found {} USB device(s):\n", devices.len());
        for device in devices {
            println!(
                "  {} - {} {}",
                device.identity,
                device.manufacturer.as_deref().unwrap_or("Unknown"),
                device.product.as_deref().unwrap_or("Unknown")
            );
            println!(
                "      Bus {:03} Device {:03}",
                device.bus_number, device.address
            );
            println!();
        }
    }

    Ok(())
}
