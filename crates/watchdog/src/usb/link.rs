//! Raw access to a claimed USB device
//!
//! [`UsbLink`] is the narrow seam between the protocol logic and libusb.
//! The production implementation wraps a `rusb::DeviceHandle`; tests use
//! [`crate::test_utils::MockLink`].

use protocol::{Endpoint, TransferKind};
use rusb::{DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::debug;

/// Interface number the watchdog protocol runs on
pub const WATCHDOG_INTERFACE: u8 = 0;

/// Transfer primitives needed by [`super::EndpointChannel`]
pub trait UsbLink {
    /// Write `data` to an OUT endpoint
    fn write(&mut self, endpoint: &Endpoint, data: &[u8], timeout: Duration)
    -> rusb::Result<usize>;

    /// Read into `buf` from an IN endpoint
    fn read(&mut self, endpoint: &Endpoint, buf: &mut [u8], timeout: Duration)
    -> rusb::Result<usize>;

    /// Give claimed OS resources back
    fn release(&mut self) -> rusb::Result<()>;

    /// Issue a port reset to the device
    fn reset(&mut self) -> rusb::Result<()>;
}

/// A `rusb` device handle with the watchdog interface claimed
pub struct HandleLink<T: UsbContext> {
    handle: DeviceHandle<T>,
    interface: u8,
    claimed: bool,
    /// Whether a kernel driver was detached during acquisition; it is not
    /// reattached
    kernel_driver_detached: bool,
}

impl<T: UsbContext> HandleLink<T> {
    /// Wrap a handle whose `interface` has already been claimed
    pub fn new(handle: DeviceHandle<T>, interface: u8, kernel_driver_detached: bool) -> Self {
        Self {
            handle,
            interface,
            claimed: true,
            kernel_driver_detached,
        }
    }
}

impl<T: UsbContext> UsbLink for HandleLink<T> {
    fn write(
        &mut self,
        endpoint: &Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        match endpoint.kind {
            TransferKind::Interrupt => self.handle.write_interrupt(endpoint.address, data, timeout),
            TransferKind::Bulk => self.handle.write_bulk(endpoint.address, data, timeout),
            TransferKind::Isochronous | TransferKind::Control => Err(rusb::Error::NotSupported),
        }
    }

    fn read(
        &mut self,
        endpoint: &Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        match endpoint.kind {
            TransferKind::Interrupt => self.handle.read_interrupt(endpoint.address, buf, timeout),
            TransferKind::Bulk => self.handle.read_bulk(endpoint.address, buf, timeout),
            TransferKind::Isochronous | TransferKind::Control => Err(rusb::Error::NotSupported),
        }
    }

    fn release(&mut self) -> rusb::Result<()> {
        if !self.claimed {
            return Ok(());
        }
        self.claimed = false;
        self.handle.release_interface(self.interface)?;
        if self.kernel_driver_detached {
            debug!(
                "Released interface {}, kernel driver left detached",
                self.interface
            );
        } else {
            debug!("Released interface {}", self.interface);
        }
        Ok(())
    }

    fn reset(&mut self) -> rusb::Result<()> {
        self.handle.reset()?;
        debug!("Reset device");
        Ok(())
    }
}
