//! Watchdog error types

use protocol::{DeviceIdentity, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid command line or config file values
    #[error("Configuration error: {0}")]
    Config(String),

    /// No device with the requested identity is on the bus
    #[error("Device {0} not found")]
    NotFound(DeviceIdentity),

    /// The OS refused access to the device
    #[error("Insufficient permissions to access the device during {op}")]
    PermissionDenied { op: &'static str },

    /// The device does not expose the endpoints the protocol needs
    #[error("Malformed device descriptor: {0}")]
    MalformedDescriptor(String),

    /// Transport failure talking to the device
    #[error("USB error during {op}: {source}")]
    Usb {
        op: &'static str,
        #[source]
        source: rusb::Error,
    },

    /// The operator interrupted the daemon
    #[error("Interrupted by user")]
    Interrupted,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl Error {
    /// Wrap a rusb failure, pulling permission problems out into their own kind
    pub fn usb(op: &'static str, source: rusb::Error) -> Self {
        match source {
            rusb::Error::Access => Error::PermissionDenied { op },
            source => Error::Usb { op, source },
        }
    }

    /// Returns a closure suitable for `map_err`
    pub fn during(op: &'static str) -> impl Fn(rusb::Error) -> Self {
        move |source| Self::usb(op, source)
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Error::PermissionDenied { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
