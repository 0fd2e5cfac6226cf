//! USB subsystem
//!
//! Locates the watchdog module, claims it, and wraps its endpoint pair in an
//! [`EndpointChannel`] that carries out the request/response exchange.
//!
//! All calls block; the only timeouts are the short fixed per-transfer ones
//! defined in [`channel`].

pub mod channel;
pub mod link;
pub mod locator;

pub use channel::{CLEANUP_SETTLE, DRAIN_TIMEOUT, EndpointChannel, READ_TIMEOUT, WRITE_TIMEOUT};
pub use link::{HandleLink, UsbLink, WATCHDOG_INTERFACE};
pub use locator::{DeviceLocator, DeviceSummary, UsbLocator};
