//! GATT UUID Catalog
//!
//! Closed catalogs of the Bluetooth SIG services and characteristics this
//! client understands. The set is fixed by the SIG assigned numbers; anything
//! outside it is ignored rather than registered at runtime.

use std::fmt;
use uuid::Uuid;

/// Bluetooth Base UUID, `00000000-0000-1000-8000-00805f9b34fb`.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Parse a 16-bit assigned number out of any of the usual UUID spellings:
/// `180D`, `0x180d`, or any 128-bit form [`Uuid::parse_str`] accepts
/// (hyphenated, simple, braced, `urn:uuid:`) that sits on the Bluetooth base.
pub fn parse_uuid16(uuid: &str) -> Option<u16> {
    let uuid = uuid.trim();
    let short = uuid
        .strip_prefix("0x")
        .or_else(|| uuid.strip_prefix("0X"))
        .unwrap_or(uuid);
    if short.len() == 4 {
        if !short.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return u16::from_str_radix(short, 16).ok();
    }

    let value = Uuid::parse_str(uuid).ok()?.as_u128();
    let assigned = value ^ BLUETOOTH_BASE_UUID;
    // Only the 16 bits at the top of the first group may differ from the base
    if assigned & !(0xFFFF_u128 << 96) != 0 {
        return None;
    }
    u16::try_from(assigned >> 96).ok()
}

/// Expand a 16-bit assigned number to its full 128-bit string form.
pub fn expand_uuid16(uuid: u16) -> String {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | (u128::from(uuid) << 96))
        .hyphenated()
        .to_string()
}

/// GATT services this client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceId {
    DeviceInfo,
    HeartRate,
    Battery,
}

impl ServiceId {
    /// Every known service, in scan/discovery filter order.
    pub const ALL: [ServiceId; 3] = [Self::HeartRate, Self::Battery, Self::DeviceInfo];

    pub fn uuid16(self) -> u16 {
        match self {
            Self::DeviceInfo => 0x180A,
            Self::HeartRate => 0x180D,
            Self::Battery => 0x180F,
        }
    }

    /// Canonical short UUID string, e.g. `180D`.
    pub fn uuid(self) -> String {
        format!("{:04X}", self.uuid16())
    }

    pub fn from_uuid16(uuid: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.uuid16() == uuid)
    }

    pub fn from_uuid(uuid: &str) -> Option<Self> {
        parse_uuid16(uuid).and_then(Self::from_uuid16)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeviceInfo => "Device Information",
            Self::HeartRate => "Heart Rate",
            Self::Battery => "Battery",
        };
        f.write_str(name)
    }
}

/// GATT characteristics this client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharacteristicId {
    HeartRateMeasurement,
    BodySensorLocation,
    BatteryLevel,
    Manufacturer,
    ModelNumber,
    SerialNumber,
    HardwareRevision,
    FirmwareRevision,
}

impl CharacteristicId {
    pub const ALL: [CharacteristicId; 8] = [
        Self::HeartRateMeasurement,
        Self::BodySensorLocation,
        Self::BatteryLevel,
        Self::Manufacturer,
        Self::ModelNumber,
        Self::SerialNumber,
        Self::HardwareRevision,
        Self::FirmwareRevision,
    ];

    pub fn uuid16(self) -> u16 {
        match self {
            Self::HeartRateMeasurement => 0x2A37,
            Self::BodySensorLocation => 0x2A38,
            Self::BatteryLevel => 0x2A19,
            Self::Manufacturer => 0x2A29,
            Self::ModelNumber => 0x2A24,
            Self::SerialNumber => 0x2A25,
            Self::HardwareRevision => 0x2A27,
            Self::FirmwareRevision => 0x2A26,
        }
    }

    pub fn uuid(self) -> String {
        format!("{:04X}", self.uuid16())
    }

    pub fn from_uuid16(uuid: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid16() == uuid)
    }

    pub fn from_uuid(uuid: &str) -> Option<Self> {
        parse_uuid16(uuid).and_then(Self::from_uuid16)
    }

    /// The service a characteristic belongs to.
    pub fn service(self) -> ServiceId {
        match self {
            Self::HeartRateMeasurement | Self::BodySensorLocation => ServiceId::HeartRate,
            Self::BatteryLevel => ServiceId::Battery,
            Self::Manufacturer
            | Self::ModelNumber
            | Self::SerialNumber
            | Self::HardwareRevision
            | Self::FirmwareRevision => ServiceId::DeviceInfo,
        }
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HeartRateMeasurement => "Heart Rate Measurement",
            Self::BodySensorLocation => "Body Sensor Location",
            Self::BatteryLevel => "Battery Level",
            Self::Manufacturer => "Manufacturer Name",
            Self::ModelNumber => "Model Number",
            Self::SerialNumber => "Serial Number",
            Self::HardwareRevision => "Hardware Revision",
            Self::FirmwareRevision => "Firmware Revision",
        };
        f.write_str(name)
    }
}
