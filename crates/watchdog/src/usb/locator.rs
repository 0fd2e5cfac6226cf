//! Finding and claiming the watchdog device

use crate::usb::channel::EndpointChannel;
use crate::usb::link::{HandleLink, UsbLink, WATCHDOG_INTERFACE};
use crate::{Error, Result};
use protocol::{DeviceIdentity, Endpoint, EndpointPair, TransferKind};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use tracing::debug;

/// Produces a ready-to-use channel for a device identity
pub trait DeviceLocator {
    type Link: UsbLink;

    /// Find, claim and bind the device, draining any stale input
    ///
    /// Fails with [`Error::NotFound`], [`Error::PermissionDenied`],
    /// [`Error::MalformedDescriptor`] or [`Error::Usb`].
    fn acquire(&mut self, identity: DeviceIdentity) -> Result<EndpointChannel<Self::Link>>;
}

/// Summary of a device on the bus, for `--list-devices`
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub identity: DeviceIdentity,
    pub bus_number: u8,
    pub address: u8,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// libusb-backed locator
pub struct UsbLocator<T: UsbContext = Context> {
    context: T,
}

impl UsbLocator<Context> {
    pub fn new() -> Result<Self> {
        let context = Context::new().map_err(Error::during("initialize libusb"))?;
        Ok(Self { context })
    }
}

impl<T: UsbContext> UsbLocator<T> {
    pub fn with_context(context: T) -> Self {
        Self { context }
    }

    /// Enumerate every device on the bus
    ///
    /// String descriptors are read when the device can be opened and left
    /// empty otherwise.
    pub fn list_devices(&self) -> Result<Vec<DeviceSummary>> {
        let devices = self
            .context
            .devices()
            .map_err(Error::during("enumerate devices"))?;

        let mut summaries = Vec::new();
        for device in devices.iter() {
            let Ok(descriptor) = device.device_descriptor() else {
                continue;
            };

            let (manufacturer, product) = match device.open() {
                Ok(handle) => (
                    descriptor
                        .manufacturer_string_index()
                        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
                    descriptor
                        .product_string_index()
                        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
                ),
                Err(_) => (None, None),
            };

            summaries.push(DeviceSummary {
                identity: DeviceIdentity::new(descriptor.vendor_id(), descriptor.product_id()),
                bus_number: device.bus_number(),
                address: device.address(),
                manufacturer,
                product,
            });
        }

        Ok(summaries)
    }

    fn find(&self, identity: DeviceIdentity) -> Result<Device<T>> {
        let devices = self
            .context
            .devices()
            .map_err(Error::during("enumerate devices"))?;

        devices
            .iter()
            .find(|device| {
                device
                    .device_descriptor()
                    .map(|d| identity.matches(d.vendor_id(), d.product_id()))
                    .unwrap_or(false)
            })
            .ok_or(Error::NotFound(identity))
    }
}

impl<T: UsbContext> DeviceLocator for UsbLocator<T> {
    type Link = HandleLink<T>;

    fn acquire(&mut self, identity: DeviceIdentity) -> Result<EndpointChannel<HandleLink<T>>> {
        debug!(
            "Looking for device with idVendor {:#06x}, idProduct {:#06x}",
            identity.vendor_id, identity.product_id
        );

        let device = self.find(identity)?;
        debug!(
            "Watchdog module found: bus {:03} device {:03}",
            device.bus_number(),
            device.address()
        );

        let mut handle = device.open().map_err(Error::during("open device"))?;
        let detached = detach_kernel_driver(&mut handle, WATCHDOG_INTERFACE)?;

        // The module has a single configuration
        let config = device
            .config_descriptor(0)
            .map_err(Error::during("read configuration descriptor"))?;
        handle
            .set_active_configuration(config.number())
            .map_err(Error::during("set configuration"))?;
        handle
            .claim_interface(WATCHDOG_INTERFACE)
            .map_err(Error::during("claim interface"))?;

        let endpoints = resolve_endpoints(&device)?;
        debug!("ep_out: {}", endpoints.outbound);
        debug!("ep_in: {}", endpoints.inbound);

        let mut channel = EndpointChannel::new(
            HandleLink::new(handle, WATCHDOG_INTERFACE, detached),
            endpoints,
        );
        channel.drain();
        Ok(channel)
    }
}

/// Detach a kernel driver bound to `interface`, if any
///
/// Returns whether a driver was detached. Platforms without kernel driver
/// support report `NotSupported`, which is treated as "nothing to detach".
fn detach_kernel_driver<T: UsbContext>(
    handle: &mut DeviceHandle<T>,
    interface: u8,
) -> Result<bool> {
    match handle.kernel_driver_active(interface) {
        Ok(true) => {
            debug!("Detaching kernel driver");
            handle
                .detach_kernel_driver(interface)
                .map_err(Error::during("detach kernel driver"))?;
            Ok(true)
        }
        Ok(false) => {
            debug!("Device not claimed by a kernel driver");
            Ok(false)
        }
        Err(rusb::Error::NotSupported) => {
            debug!("Kernel driver query not supported on this platform");
            Ok(false)
        }
        Err(e) => Err(Error::usb("query kernel driver", e)),
    }
}

/// Pick the OUT and IN endpoints of the active configuration's first interface
fn resolve_endpoints<T: UsbContext>(device: &Device<T>) -> Result<EndpointPair> {
    let config = device
        .active_config_descriptor()
        .map_err(Error::during("read active configuration"))?;

    let interface = config
        .interfaces()
        .next()
        .and_then(|interface| interface.descriptors().next())
        .ok_or_else(|| Error::MalformedDescriptor("configuration has no interfaces".to_string()))?;

    let endpoints = interface.endpoint_descriptors().map(|ep| {
        Endpoint::new(
            ep.address(),
            map_transfer_type(ep.transfer_type()),
            ep.max_packet_size(),
        )
    });

    EndpointPair::select(endpoints).ok_or_else(|| {
        Error::MalformedDescriptor(format!(
            "interface {} lacks an IN and OUT endpoint",
            interface.interface_number()
        ))
    })
}

/// Map rusb transfer type to protocol TransferKind
fn map_transfer_type(kind: rusb::TransferType) -> TransferKind {
    match kind {
        rusb::TransferType::Bulk => TransferKind::Bulk,
        rusb::TransferType::Interrupt => TransferKind::Interrupt,
        rusb::TransferType::Isochronous => TransferKind::Isochronous,
        rusb::TransferType::Control => TransferKind::Control,
    }
}
