//! Protocol library for usb-watchdog
//!
//! This crate defines the hardware-independent pieces of the USB watchdog
//! protocol: the two wire commands, the device identity, endpoint
//! descriptions and the connection lifecycle state.
//!
//! # Example
//!
//! ```
//! use protocol::{DeviceIdentity, Packet};
//!
//! let identity: DeviceIdentity = "0x5131:0x2007".parse().unwrap();
//! assert_eq!(identity, DeviceIdentity::default());
//!
//! // The device is expected to echo each command verbatim
//! assert!(Packet::Ping.is_echoed_by(&[0x1e, 0x00]));
//! ```

pub mod error;
pub mod identity;
pub mod packet;
pub mod state;
pub mod types;

pub use error::{ProtocolError, Result};
pub use identity::{DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID, DeviceIdentity, parse_hex_id};
pub use packet::{
    DRAIN_MAX_READS, DRAIN_READ_LEN, PACKET_LEN, Packet, REPLY_READ_LEN, hex_dump,
};
pub use state::{ConnectionEvent, ConnectionState};
pub use types::{Direction, Endpoint, EndpointPair, TransferKind};
