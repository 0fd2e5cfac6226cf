//! Reconnect supervisor
//!
//! Top-level control loop. It acquires the device, hands it to a
//! [`WatchdogSession`], and when anything goes wrong it cleans up, waits
//! [`RETRY_DELAY`] and tries again. Only a sent restart command or an
//! interrupt ends the loop.
//!
//! Logging follows the connection state:
//! - failures before the first connection are expected and produce a single
//!   "waiting" notice
//! - a failure while connected is reported as an error
//! - repeated failures while disconnected are retried quietly
//!
//! Permission problems are reported every time regardless of state since no
//! amount of retrying fixes them, but they are still retried.

use crate::config::Settings;
use crate::session::{Mode, SessionEnd, WatchdogSession};
use crate::usb::DeviceLocator;
use crate::{Error, Pause, Result};
use protocol::{ConnectionEvent, ConnectionState, DeviceIdentity, Packet};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Fixed delay between connection attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Notable things that happen while supervising
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The first attempt failed; we are waiting for the device
    Waiting,
    /// The device was acquired and the session is starting
    Connected { identity: DeviceIdentity },
    /// An established connection failed
    ConnectionLost,
    /// The OS denied access to the device
    PermissionDenied,
    /// A command was exchanged with the device
    Exchange { packet: Packet, matched: bool },
}

/// Receives [`SupervisorEvent`]s
pub trait StatusSink {
    fn publish(&self, event: &SupervisorEvent);
}

impl<S: StatusSink + ?Sized> StatusSink for &S {
    fn publish(&self, event: &SupervisorEvent) {
        (**self).publish(event)
    }
}

/// Owns the connection lifecycle
pub struct ReconnectSupervisor<D, P, S>
where
    D: DeviceLocator,
    P: Pause,
    S: StatusSink,
{
    locator: D,
    pause: P,
    sink: S,
    identity: DeviceIdentity,
    mode: Mode,
    interval: Duration,
    state: ConnectionState,
}

impl<D, P, S> ReconnectSupervisor<D, P, S>
where
    D: DeviceLocator,
    P: Pause,
    S: StatusSink,
{
    pub fn new(locator: D, pause: P, sink: S, settings: &Settings) -> Self {
        Self {
            locator,
            pause,
            sink,
            identity: settings.identity,
            mode: settings.mode,
            interval: settings.interval,
            state: ConnectionState::Startup,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn locator(&self) -> &D {
        &self.locator
    }

    /// Supervise until a restart is sent or the pause source is cancelled
    ///
    /// Returns `Err(Error::Interrupted)` on cancellation; every other failure
    /// is logged and retried.
    pub fn run(&mut self) -> Result<SessionEnd> {
        loop {
            self.pause.checkpoint()?;

            match self.attempt() {
                Ok(end) => return Ok(end),
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => self.report_failure(&e),
            }

            // Give some indication that we are, in fact, trying
            if self.state.announces_waiting() {
                info!("Waiting for watchdog module to be connected...");
                self.sink.publish(&SupervisorEvent::Waiting);
            }
            self.state = self.state.next(ConnectionEvent::Lost);

            self.pause.pause(RETRY_DELAY)?;
        }
    }

    /// Acquire the device and run one session on it, cleaning up afterwards
    fn attempt(&mut self) -> Result<SessionEnd> {
        let channel = self.locator.acquire(self.identity)?;

        self.state = self.state.next(ConnectionEvent::Acquired);
        info!("Connected to watchdog module {}", self.identity);
        self.sink.publish(&SupervisorEvent::Connected {
            identity: self.identity,
        });

        let mut session = WatchdogSession::new(channel, self.mode, self.interval);
        let outcome = session.run(&self.pause, &self.sink);

        // Cleanup only fails when interrupted, which outranks any session error
        session.cleanup(&self.pause)?;
        outcome
    }

    fn report_failure(&self, err: &Error) {
        if err.is_permission_denied() {
            error!(
                "Insufficient permissions to access the device. This is an OS problem you must correct."
            );
            self.sink.publish(&SupervisorEvent::PermissionDenied);
        }

        if let Error::MalformedDescriptor(_) = err {
            warn!("{}", err);
        }

        if self.state.failure_is_fault() {
            error!("USB communication error or device removed.");
            debug!("Encountered {:?}", err);
            self.sink.publish(&SupervisorEvent::ConnectionLost);
        } else {
            debug!("Connection attempt failed: {}", err);
        }
    }
}

/// Process exit code for a finished supervisor run
pub fn exit_code(result: &Result<SessionEnd>) -> u8 {
    match result {
        Ok(SessionEnd::RestartSent { .. }) => 0,
        Err(_) => 1,
    }
}
