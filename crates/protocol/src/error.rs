//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A vendor or product id could not be parsed as 16-bit hex
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidHexId {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A `VID:PID` pair was missing its separator
    #[error("Invalid device identity '{0}', expected VID:PID (e.g. '5131:2007')")]
    InvalidIdentity(String),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
