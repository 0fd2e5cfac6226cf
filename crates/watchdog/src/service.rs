//! Systemd service integration
//!
//! Speaks systemd's sd-notify protocol so the daemon can run as a
//! `Type=notify` unit: readiness once the module is first connected, a
//! status line that follows the connection state, and a `WATCHDOG=1`
//! keepalive for every exchange with the module. Outside
//! systemd (no `NOTIFY_SOCKET`) every call is a no-op.

use crate::supervisor::{StatusSink, SupervisorEvent};
use crate::Result;
use std::env;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sends sd-notify messages to the socket systemd gave us
#[derive(Debug, Default)]
pub struct SystemdNotifier {
    socket_path: Option<PathBuf>,
    ready_sent: AtomicBool,
}

impl SystemdNotifier {
    /// Notifier for the `NOTIFY_SOCKET` of this process, if any
    pub fn from_env() -> Self {
        match env::var_os("NOTIFY_SOCKET") {
            Some(path) => Self::with_socket(path),
            None => {
                debug!("NOTIFY_SOCKET not set, systemd notifications disabled");
                Self::default()
            }
        }
    }

    pub fn with_socket(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: Some(path.into()),
            ready_sent: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.socket_path.is_some()
    }

    /// Send a raw sd-notify message
    pub fn notify(&self, message: &str) -> Result<()> {
        let Some(path) = &self.socket_path else {
            return Ok(());
        };
        send_datagram(path, message)?;
        debug!("Notified systemd: {}", message);
        Ok(())
    }

    /// Tell systemd startup is complete; only the first call sends anything
    pub fn ready(&self) -> Result<()> {
        if !self.is_enabled() || self.ready_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.notify("READY=1")?;
        info!("Notified systemd: service ready");
        Ok(())
    }

    /// Status line shown by `systemctl status`
    pub fn status(&self, status: &str) -> Result<()> {
        self.notify(&format!("STATUS={}", status))
    }

    /// Keepalive for a unit with `WatchdogSec=` set
    pub fn watchdog(&self) -> Result<()> {
        self.notify("WATCHDOG=1")
    }

    pub fn stopping(&self) -> Result<()> {
        self.notify("STOPPING=1")
    }

    fn try_publish(&self, event: &SupervisorEvent) -> Result<()> {
        match event {
            SupervisorEvent::Waiting => self.status("Waiting for watchdog module"),
            SupervisorEvent::Connected { identity } => {
                self.ready()?;
                self.status(&format!("Connected to watchdog module {}", identity))
            }
            SupervisorEvent::ConnectionLost => self.status("Watchdog module lost, reconnecting"),
            SupervisorEvent::PermissionDenied => {
                self.status("Permission denied opening watchdog module")
            }
            // The module answered, echoed or not
            SupervisorEvent::Exchange { .. } => self.watchdog(),
        }
    }
}

impl StatusSink for SystemdNotifier {
    fn publish(&self, event: &SupervisorEvent) {
        if let Err(e) = self.try_publish(event) {
            warn!("Failed to notify systemd: {}", e);
        }
    }
}

fn send_datagram(path: &Path, message: &str) -> Result<()> {
    let socket = UnixDatagram::unbound()?;
    socket.send_to(message.as_bytes(), path)?;
    Ok(())
}

/// Watchdog timeout configured on the unit, if any
pub fn watchdog_timeout() -> Option<Duration> {
    env::var("WATCHDOG_USEC")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_micros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{DeviceIdentity, Packet};
    use tempfile::TempDir;

    struct Listener {
        _dir: TempDir,
        socket: UnixDatagram,
        path: PathBuf,
    }

    impl Listener {
        fn bind() -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("notify.sock");
            let socket = UnixDatagram::bind(&path).unwrap();
            socket.set_nonblocking(true).unwrap();
            Self {
                _dir: dir,
                socket,
                path,
            }
        }

        fn received(&self) -> Vec<String> {
            let mut messages = Vec::new();
            let mut buf = [0u8; 256];
            while let Ok(len) = self.socket.recv(&mut buf) {
                messages.push(String::from_utf8_lossy(&buf[..len]).into_owned());
            }
            messages
        }
    }

    #[test]
    fn test_disabled_notifier_is_noop() {
        let notifier = SystemdNotifier::default();
        assert!(!notifier.is_enabled());
        assert!(notifier.ready().is_ok());
        assert!(notifier.status("anything").is_ok());
        assert!(notifier.watchdog().is_ok());
        assert!(notifier.stopping().is_ok());
    }

    #[test]
    fn test_ready_sent_once() {
        let listener = Listener::bind();
        let notifier = SystemdNotifier::with_socket(&listener.path);

        notifier.ready().unwrap();
        notifier.ready().unwrap();

        assert_eq!(listener.received(), vec!["READY=1"]);
    }

    #[test]
    fn test_event_mapping() {
        let listener = Listener::bind();
        let notifier = SystemdNotifier::with_socket(&listener.path);

        notifier.publish(&SupervisorEvent::Waiting);
        notifier.publish(&SupervisorEvent::Connected {
            identity: DeviceIdentity::default(),
        });
        notifier.publish(&SupervisorEvent::Exchange {
            packet: Packet::Ping,
            matched: true,
        });
        notifier.publish(&SupervisorEvent::Exchange {
            packet: Packet::Ping,
            matched: false,
        });
        notifier.publish(&SupervisorEvent::ConnectionLost);
        notifier.publish(&SupervisorEvent::Connected {
            identity: DeviceIdentity::default(),
        });

        assert_eq!(
            listener.received(),
            vec![
                "STATUS=Waiting for watchdog module",
                "READY=1",
                "STATUS=Connected to watchdog module 5131:2007",
                "WATCHDOG=1",
                "WATCHDOG=1",
                "STATUS=Watchdog module lost, reconnecting",
                "STATUS=Connected to watchdog module 5131:2007",
            ]
        );
    }

    #[test]
    fn test_missing_socket_is_logged_not_fatal() {
        let dir = TempDir::new().unwrap();
        let notifier = SystemdNotifier::with_socket(dir.path().join("absent.sock"));

        assert!(notifier.watchdog().is_err());
        // publish swallows the failure
        notifier.publish(&SupervisorEvent::ConnectionLost);
    }
}
