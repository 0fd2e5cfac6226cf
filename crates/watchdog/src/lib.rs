//! USB hardware watchdog client
//!
//! Keeps a USB watchdog module from power-cycling the host by pinging it at a
//! fixed interval, or asks it to restart the host right away. The module may
//! be unplugged and replugged at any time; the [`ReconnectSupervisor`]
//! reacquires it and resumes.
//!
//! # Layout
//!
//! - [`usb`]: locating, claiming and talking to the device
//! - [`session`]: the ping loop / restart command on one connection
//! - [`supervisor`]: the reconnect state machine around sessions
//! - [`shutdown`]: interruptible pauses driven by Ctrl+C
//! - [`config`], [`cli`], [`logging`], [`service`]: process plumbing

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod session;
pub mod shutdown;
pub mod supervisor;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod usb;

pub use config::{Settings, WatchdogConfig};
pub use error::{Error, Result};
pub use session::{Mode, SessionEnd, WatchdogSession};
pub use shutdown::{Pause, Shutdown};
pub use supervisor::{ReconnectSupervisor, StatusSink, SupervisorEvent, exit_code};
