//! Watchdog wire commands
//!
//! The watchdog speaks a two-byte request/response protocol. The host writes
//! a command to the OUT endpoint and the device echoes the same two bytes on
//! its IN endpoint.

use std::fmt;

/// Size of every command on the wire
pub const PACKET_LEN: usize = 2;

/// Largest reply read back from the device after a command
pub const REPLY_READ_LEN: usize = 16;

/// Buffer size requested by each drain read
pub const DRAIN_READ_LEN: usize = 1024;

/// Upper bound on drain reads per connection attempt
pub const DRAIN_MAX_READS: usize = 256;

/// A watchdog command
///
/// The protocol defines exactly two commands; anything else the device sends
/// back is only ever compared against one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packet {
    /// Keep-alive: resets the device's countdown
    Ping,
    /// Ask the device to power-cycle the host immediately
    Restart,
}

impl Packet {
    /// Wire bytes for this command
    pub const fn bytes(self) -> [u8; PACKET_LEN] {
        match self {
            Packet::Ping => [0x1E, 0x00],
            Packet::Restart => [0xFF, 0x55],
        }
    }

    /// Returns true when `reply` is a byte-exact echo of this command
    pub fn is_echoed_by(self, reply: &[u8]) -> bool {
        reply == self.bytes().as_slice()
    }

    /// Human readable command name
    pub const fn name(self) -> &'static str {
        match self {
            Packet::Ping => "ping",
            Packet::Restart => "restart",
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), hex_dump(&self.bytes()))
    }
}

/// Format bytes as `0x`-prefixed lowercase hex, e.g. `0x1e00`
///
/// An empty slice renders as `0x` so that a missing reply is still visible
/// in logs.
pub fn hex_dump(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
