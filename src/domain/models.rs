use crate::infrastructure::bluetooth::uuids::CharacteristicId;
use std::fmt;

/// Power/authorization state of the local radio, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

/// Stable identifier of a remote peripheral, as assigned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A discovered radio peer. The transport object itself stays with the
/// platform adapter; the core only keeps its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralHandle {
    pub id: PeripheralId,
    pub name: Option<String>,
}

impl PeripheralHandle {
    pub fn new(id: impl Into<PeripheralId>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }

    /// Name for log output, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Skin contact reported in bits 1-2 of the Heart Rate Measurement flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorContact {
    #[default]
    NotSupported,
    NotDetected,
    Detected,
}

/// Decoded Heart Rate Measurement (0x2A37) notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeartRateMeasurement {
    pub bpm: u16,
    pub energy_expended_kj: Option<u16>,
    pub sensor_contact: SensorContact,
    /// RR-intervals in units of 1/1024 s, oldest first.
    pub rr_intervals: Vec<u16>,
}

impl HeartRateMeasurement {
    pub fn new(bpm: u16, energy_expended_kj: Option<u16>) -> Self {
        Self {
            bpm,
            energy_expended_kj,
            ..Default::default()
        }
    }

    /// RR-intervals converted to milliseconds.
    pub fn rr_intervals_ms(&self) -> impl Iterator<Item = f64> + '_ {
        self.rr_intervals
            .iter()
            .map(|&rr| f64::from(rr) * 1000.0 / 1024.0)
    }
}

/// Body Sensor Location (0x2A38).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySensorLocation {
    Other = 0,
    Chest = 1,
    Wrist = 2,
    Finger = 3,
    Hand = 4,
    EarLobe = 5,
    Foot = 6,
}

impl BodySensorLocation {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Other),
            1 => Some(Self::Chest),
            2 => Some(Self::Wrist),
            3 => Some(Self::Finger),
            4 => Some(Self::Hand),
            5 => Some(Self::EarLobe),
            6 => Some(Self::Foot),
            _ => None,
        }
    }
}

/// Text fields of the Device Information service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceInfoField {
    Manufacturer,
    ModelNumber,
    SerialNumber,
    HardwareRevision,
    FirmwareRevision,
}

impl DeviceInfoField {
    pub fn from_characteristic(characteristic: CharacteristicId) -> Option<Self> {
        match characteristic {
            CharacteristicId::Manufacturer => Some(Self::Manufacturer),
            CharacteristicId::ModelNumber => Some(Self::ModelNumber),
            CharacteristicId::SerialNumber => Some(Self::SerialNumber),
            CharacteristicId::HardwareRevision => Some(Self::HardwareRevision),
            CharacteristicId::FirmwareRevision => Some(Self::FirmwareRevision),
            _ => None,
        }
    }

    pub fn characteristic(self) -> CharacteristicId {
        match self {
            Self::Manufacturer => CharacteristicId::Manufacturer,
            Self::ModelNumber => CharacteristicId::ModelNumber,
            Self::SerialNumber => CharacteristicId::SerialNumber,
            Self::HardwareRevision => CharacteristicId::HardwareRevision,
            Self::FirmwareRevision => CharacteristicId::FirmwareRevision,
        }
    }
}

/// A successfully decoded characteristic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    HeartRate(HeartRateMeasurement),
    BodySensorLocation(BodySensorLocation),
    BatteryLevel(u8),
    DeviceInfo {
        field: DeviceInfoField,
        value: String,
    },
}

/// Where the connection state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Discovering,
    Active,
    /// The adapter is unauthorized or unsupported.
    Halted,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Discovering => "discovering",
            Self::Active => "active",
            Self::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// Events forwarded over channels to the application side.
#[derive(Debug, Clone)]
pub enum AppEvent {
    HeartRate(HeartRateMeasurement),
    BatteryLevel(u8),
    BodySensorLocation(BodySensorLocation),
    DeviceInfo {
        field: DeviceInfoField,
        value: String,
    },
    Phase(ConnectionPhase),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_sensor_location_range() {
        assert_eq!(BodySensorLocation::from_u8(0), Some(BodySensorLocation::Other));
        assert_eq!(BodySensorLocation::from_u8(5), Some(BodySensorLocation::EarLobe));
        assert_eq!(BodySensorLocation::from_u8(6), Some(BodySensorLocation::Foot));
        assert_eq!(BodySensorLocation::from_u8(7), None);
        assert_eq!(BodySensorLocation::from_u8(0xFF), None);
    }

    #[test]
    fn test_device_info_field_mapping() {
        assert_eq!(
            DeviceInfoField::from_characteristic(CharacteristicId::FirmwareRevision),
            Some(DeviceInfoField::FirmwareRevision)
        );
        assert_eq!(
            DeviceInfoField::from_characteristic(CharacteristicId::BatteryLevel),
            None
        );
        assert_eq!(
            DeviceInfoField::ModelNumber.characteristic(),
            CharacteristicId::ModelNumber
        );
    }

    #[test]
    fn test_rr_intervals_ms() {
        let measurement = HeartRateMeasurement {
            rr_intervals: vec![1024, 512],
            ..HeartRateMeasurement::new(60, None)
        };
        let ms: Vec<f64> = measurement.rr_intervals_ms().collect();
        assert_eq!(ms, vec![1000.0, 500.0]);
    }

    #[test]
    fn test_peripheral_display_name() {
        let named = PeripheralHandle::new("A1", Some("Polar H10"));
        let unnamed = PeripheralHandle::new("B2", None);
        assert_eq!(named.display_name(), "Polar H10");
        assert_eq!(unnamed.display_name(), "B2");
    }
}
