//! One connection's worth of watchdog protocol

use crate::supervisor::{StatusSink, SupervisorEvent};
use crate::usb::{EndpointChannel, UsbLink};
use crate::{Pause, Result};
use protocol::Packet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// What the daemon does once connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Keep the watchdog fed forever
    #[default]
    Ping,
    /// Send a single restart command and exit
    Restart,
}

/// How a session finished without error
///
/// Ping mode never finishes on its own, so the only clean ending is a sent
/// restart command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The restart command went out; `acknowledged` is false when the
    /// device's echo did not match
    RestartSent { acknowledged: bool },
}

/// Owns the channel of one connection and runs the ping/restart protocol on it
pub struct WatchdogSession<L: UsbLink> {
    channel: EndpointChannel<L>,
    mode: Mode,
    interval: Duration,
}

impl<L: UsbLink> WatchdogSession<L> {
    pub fn new(channel: EndpointChannel<L>, mode: Mode, interval: Duration) -> Self {
        Self {
            channel,
            mode,
            interval,
        }
    }

    /// Run until the restart is sent, a transfer fails, or `pause` is cancelled
    pub fn run<P, S>(&mut self, pause: &P, sink: &S) -> Result<SessionEnd>
    where
        P: Pause,
        S: StatusSink,
    {
        match self.mode {
            Mode::Restart => {
                info!("restarting system...");
                let acknowledged = self.exchange(Packet::Restart, sink)?;
                Ok(SessionEnd::RestartSent { acknowledged })
            }
            Mode::Ping => loop {
                pause.checkpoint()?;
                info!("pinging!");
                self.exchange(Packet::Ping, sink)?;
                pause.pause(self.interval)?;
            },
        }
    }

    /// Release and reset the device; see [`EndpointChannel::cleanup`]
    pub fn cleanup<P: Pause>(&mut self, pause: &P) -> Result<()> {
        self.channel.cleanup(pause)
    }

    fn exchange<S: StatusSink>(&mut self, packet: Packet, sink: &S) -> Result<bool> {
        let matched = self.channel.send_and_compare(packet)?;
        sink.publish(&SupervisorEvent::Exchange { packet, matched });
        Ok(matched)
    }
}
