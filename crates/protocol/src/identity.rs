//! USB device identity (vendor/product id pair)

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default vendor id of the supported watchdog module
pub const DEFAULT_VENDOR_ID: u16 = 0x5131;

/// Default product id of the supported watchdog module
pub const DEFAULT_PRODUCT_ID: u16 = 0x2007;

/// Identifies the target device on the bus
///
/// Serialized as `"VID:PID"` hex text so it reads naturally in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Build an identity from two hex strings (`"0x5131"` or `"5131"`)
    pub fn from_hex(vendor: &str, product: &str) -> Result<Self> {
        Ok(Self {
            vendor_id: parse_hex_id(vendor, "vendor id")?,
            product_id: parse_hex_id(product, "product id")?,
        })
    }

    /// Returns true if a device descriptor carries this identity
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl FromStr for DeviceIdentity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let (vendor, product) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidIdentity(s.to_string()))?;
        Self::from_hex(vendor, product)
    }
}

impl TryFrom<String> for DeviceIdentity {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceIdentity> for String {
    fn from(identity: DeviceIdentity) -> Self {
        identity.to_string()
    }
}

/// Parse a 16-bit USB id written in hex, with or without a `0x` prefix
pub fn parse_hex_id(text: &str, field: &'static str) -> Result<u16> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let invalid = |reason| ProtocolError::InvalidHexId {
        field,
        value: text.to_string(),
        reason,
    };

    if digits.is_empty() || digits.len() > 4 {
        return Err(invalid("hex part must be 1-4 digits"));
    }

    u16::from_str_radix(digits, 16).map_err(|_| invalid("not a valid hex number"))
}
