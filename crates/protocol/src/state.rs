//! Connection lifecycle state
//!
//! The daemon starts in [`ConnectionState::Startup`]; the first acquisition
//! attempt moves it to either `Connected` or `Disconnected`, after which it
//! alternates between those two and never returns to `Startup`.

use std::fmt;

/// Lifecycle state of the single watchdog connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No acquisition attempt has completed yet
    #[default]
    Startup,
    /// A device is claimed and the protocol loop is running
    Connected,
    /// The last attempt failed or the device went away
    Disconnected,
}

/// Something that happened to the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The device was found, claimed and its endpoints bound
    Acquired,
    /// Acquisition failed or the running session faulted
    Lost,
}

impl ConnectionState {
    /// Apply an event and return the next state
    pub fn next(self, event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Acquired => ConnectionState::Connected,
            ConnectionEvent::Lost => ConnectionState::Disconnected,
        }
    }

    /// Whether a failure in this state is a real fault worth reporting
    ///
    /// Failures before the first connection are expected (the device may
    /// simply not be plugged in yet) and so are repeated failures while
    /// disconnected.
    pub fn failure_is_fault(self) -> bool {
        self == ConnectionState::Connected
    }

    /// Whether the operator should be told we are waiting for the device
    pub fn announces_waiting(self) -> bool {
        self == ConnectionState::Startup
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Startup => "startup",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
