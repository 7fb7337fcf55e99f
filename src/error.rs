//! Error taxonomy
//!
//! Three classes of failure reach the monitor:
//!
//! - [`DecodeError`]: a characteristic value could not be decoded. Always
//!   recoverable; the session continues.
//! - [`TransportError`]: connect or discovery failed. Absorbed and retried by
//!   re-entering scanning; never surfaced to the sink.
//! - [`CapabilityError`]: the adapter is unauthorized or unsupported. Fatal
//!   until the adapter state changes externally.

use crate::infrastructure::bluetooth::uuids::CharacteristicId;
use thiserror::Error;

/// Failure decoding a raw characteristic value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{characteristic} value truncated: need {needed} bytes, got {actual}")]
    Truncated {
        characteristic: CharacteristicId,
        needed: usize,
        actual: usize,
    },

    #[error("{characteristic} value {value:#04x} is not a known enum value")]
    UnknownEnumValue {
        characteristic: CharacteristicId,
        value: u8,
    },

    #[error("{characteristic} value is not valid UTF-8")]
    InvalidEncoding { characteristic: CharacteristicId },

    #[error("unsupported characteristic: {0}")]
    UnsupportedCharacteristic(String),
}

/// Failure reported by the platform radio while connecting or discovering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("platform error: {0}")]
    Platform(String),
}

/// Adapter state that rules out any radio activity.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("the application is not authorized to use Bluetooth")]
    Unauthorized,

    #[error("Bluetooth Low Energy is not supported on this system")]
    Unsupported,
}

/// Anything the monitor may report to an event sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

impl MonitorError {
    /// Whether the error halts scanning and connecting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Capability(_))
    }
}
