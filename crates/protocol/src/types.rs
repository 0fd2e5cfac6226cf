//! USB endpoint descriptions
//!
//! These are the hardware-independent views of the endpoints resolved from
//! the device's first interface. They are rebuilt on every connection attempt.

use std::fmt;

/// Direction bit of an endpoint address (bit 7)
pub const ENDPOINT_DIR_MASK: u8 = 0x80;

/// Endpoint direction relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

impl Direction {
    /// Derive the direction from an endpoint address
    pub const fn from_address(address: u8) -> Self {
        if address & ENDPOINT_DIR_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

/// Transfer type of a non-control endpoint
///
/// The watchdog modules seen in the wild use interrupt endpoints, but bulk is
/// accepted as well so that clones with different descriptors still work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Bulk,
    Interrupt,
    Isochronous,
    Control,
}

/// A resolved endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Endpoint address including the direction bit
    pub address: u8,
    pub direction: Direction,
    pub kind: TransferKind,
    pub max_packet_size: u16,
}

impl Endpoint {
    pub fn new(address: u8, kind: TransferKind, max_packet_size: u16) -> Self {
        Self {
            address,
            direction: Direction::from_address(address),
            kind,
            max_packet_size,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "endpoint {:#04x} ({} {:?}, max packet {} bytes)",
            self.address,
            self.direction.as_str(),
            self.kind,
            self.max_packet_size
        )
    }
}

/// The OUT/IN endpoint pair the watchdog talks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    pub outbound: Endpoint,
    pub inbound: Endpoint,
}

impl EndpointPair {
    /// Pick the first OUT and the first IN endpoint, in descriptor order
    ///
    /// Returns `None` if either direction is missing.
    pub fn select<I>(endpoints: I) -> Option<Self>
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let mut outbound = None;
        let mut inbound = None;

        for endpoint in endpoints {
            match endpoint.direction {
                Direction::Out if outbound.is_none() => outbound = Some(endpoint),
                Direction::In if inbound.is_none() => inbound = Some(endpoint),
                _ => {}
            }
        }

        Some(Self {
            outbound: outbound?,
            inbound: inbound?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_direction() {
        assert_eq!(Direction::from_address(0x81), Direction::In);
        assert_eq!(Direction::from_address(0x01), Direction::Out);
        assert_eq!(Direction::from_address(0x02), Direction::Out);
    }

    #[test]
    fn test_select_first_of_each_direction() {
        let endpoints = vec![
            Endpoint::new(0x81, TransferKind::Interrupt, 8),
            Endpoint::new(0x82, TransferKind::Interrupt, 8),
            Endpoint::new(0x01, TransferKind::Interrupt, 8),
            Endpoint::new(0x02, TransferKind::Bulk, 64),
        ];

        let pair = EndpointPair::select(endpoints).unwrap();
        assert_eq!(pair.inbound.address, 0x81);
        assert_eq!(pair.outbound.address, 0x01);
    }

    #[test]
    fn test_select_missing_direction() {
        let only_in = vec![Endpoint::new(0x81, TransferKind::Interrupt, 8)];
        assert!(EndpointPair::select(only_in).is_none());
        assert!(EndpointPair::select(Vec::new()).is_none());
    }
}
