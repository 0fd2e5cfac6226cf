//! Request/response exchange over the bound endpoint pair

use crate::usb::link::UsbLink;
use crate::{Error, Pause, Result};
use protocol::{DRAIN_MAX_READS, DRAIN_READ_LEN, EndpointPair, Packet, REPLY_READ_LEN, hex_dump};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for writing a command
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeout for reading the echoed reply
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeout for each drain read; expiry is the normal end of a drain
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

/// Pause between releasing the device and resetting it
pub const CLEANUP_SETTLE: Duration = Duration::from_millis(100);

/// The OUT/IN endpoints of one connection, plus the link that owns them
///
/// The channel is also the cleanup guard for its connection: call
/// [`EndpointChannel::cleanup`] when the session ends. If that never happens
/// (for example while unwinding from a panic) `Drop` still releases and
/// resets the device, minus the settle pause.
#[derive(Debug)]
pub struct EndpointChannel<L: UsbLink> {
    link: L,
    endpoints: EndpointPair,
    cleaned_up: bool,
}

impl<L: UsbLink> EndpointChannel<L> {
    pub fn new(link: L, endpoints: EndpointPair) -> Self {
        Self {
            link,
            endpoints,
            cleaned_up: false,
        }
    }

    /// Read and discard whatever the device queued before we attached
    ///
    /// Stops at the first failed read (normally a timeout) or after
    /// [`DRAIN_MAX_READS`] reads. Never fails. Returns the number of bytes
    /// discarded.
    pub fn drain(&mut self) -> usize {
        debug!("Trying to drain USB device input buffer");

        let mut buf = vec![0u8; DRAIN_READ_LEN];
        let mut drained = 0;

        for _ in 0..DRAIN_MAX_READS {
            match self
                .link
                .read(&self.endpoints.inbound, &mut buf, DRAIN_TIMEOUT)
            {
                Ok(len) => {
                    debug!("Drained {} bytes from USB endpoint", len);
                    drained += len;
                }
                Err(e) => {
                    debug!("Finished attempts to drain ({})", e);
                    break;
                }
            }
        }

        drained
    }

    /// Write `packet` and return whatever the device sends back
    pub fn send_and_receive(&mut self, packet: Packet) -> Result<Vec<u8>> {
        let out = packet.bytes();
        debug!("TX  {}", hex_dump(&out));

        let written = self
            .link
            .write(&self.endpoints.outbound, &out, WRITE_TIMEOUT)
            .map_err(Error::during("write"))?;
        if written != out.len() {
            debug!("Short write: {} of {} bytes", written, out.len());
        }

        let mut buf = [0u8; REPLY_READ_LEN];
        let len = self
            .link
            .read(&self.endpoints.inbound, &mut buf, READ_TIMEOUT)
            .map_err(Error::during("read"))?;
        let reply = buf.get(..len).unwrap_or(&buf).to_vec();

        debug!("RX  {}", hex_dump(&reply));
        Ok(reply)
    }

    /// Send `packet` and check that the device echoed it verbatim
    ///
    /// A mismatch is logged and reported as `Ok(false)`; only transport
    /// failures are errors.
    pub fn send_and_compare(&mut self, packet: Packet) -> Result<bool> {
        let reply = self.send_and_receive(packet)?;
        let matched = packet.is_echoed_by(&reply);

        if !matched {
            warn!(
                "Watchdog's TX and RX don't match: TX {} RX {}",
                hex_dump(&packet.bytes()),
                hex_dump(&reply)
            );
        }

        Ok(matched)
    }

    /// Best-effort release and reset of the device
    ///
    /// Release and reset are attempted independently; their failures are
    /// logged and ignored. An interrupt during the settle pause is returned
    /// only after the reset has been attempted.
    pub fn cleanup<P: Pause>(&mut self, pause: &P) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        if let Err(e) = self.link.release() {
            debug!("Ignoring failure to release device: {}", e);
        }

        let settled = pause.pause(CLEANUP_SETTLE);

        if let Err(e) = self.link.reset() {
            debug!("Ignoring failure to reset device: {}", e);
        }

        settled
    }
}

impl<L: UsbLink> Drop for EndpointChannel<L> {
    fn drop(&mut self) {
        if self.cleaned_up {
            return;
        }
        if let Err(e) = self.link.release() {
            debug!("Ignoring failure to release device on drop: {}", e);
        }
        if let Err(e) = self.link.reset() {
            debug!("Ignoring failure to reset device on drop: {}", e);
        }
    }
}
