//! GATT Characteristic Decoding
//!
//! Turns raw attribute values from the Heart Rate, Battery and Device
//! Information services into typed values. Decoding is pure and total over
//! arbitrary input: every byte sequence, including the empty one, yields
//! either a value or a [`DecodeError`].
//!
//! ## Word order
//!
//! The Bluetooth SIG encodes every multi-byte GATT field little-endian. Some
//! clients read the 16-bit heart-rate and energy fields high byte first,
//! which only agrees with the SIG encoding for values below 256 sent in the
//! 8-bit format. [`WordOrder::LittleEndian`] is the default and the only
//! compliant choice; [`WordOrder::BigEndian`] exists to reproduce the legacy
//! reading when comparing against captures made by such clients.

use crate::domain::models::{
    BodySensorLocation, DecodedEvent, DeviceInfoField, HeartRateMeasurement, SensorContact,
};
use crate::error::DecodeError;
use crate::infrastructure::bluetooth::uuids::CharacteristicId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

bitflags! {
    /// Flags byte leading every Heart Rate Measurement value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MeasurementFlags: u8 {
        const VALUE_U16 = 1 << 0;
        const SENSOR_CONTACT_DETECTED = 1 << 1;
        const SENSOR_CONTACT_SUPPORTED = 1 << 2;
        const ENERGY_EXPENDED = 1 << 3;
        const RR_INTERVALS = 1 << 4;
    }
}

/// Byte order used for 16-bit fields of the Heart Rate Measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl WordOrder {
    fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            Self::LittleEndian => u16::from_le_bytes(bytes),
            Self::BigEndian => u16::from_be_bytes(bytes),
        }
    }
}

/// Characteristic value decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    word_order: WordOrder,
}

impl Decoder {
    pub fn new(word_order: WordOrder) -> Self {
        Self { word_order }
    }

    pub fn word_order(&self) -> WordOrder {
        self.word_order
    }

    /// Decode a value for a characteristic given by UUID string.
    pub fn decode_uuid(&self, uuid: &str, bytes: &[u8]) -> Result<DecodedEvent, DecodeError> {
        let characteristic = CharacteristicId::from_uuid(uuid)
            .ok_or_else(|| DecodeError::UnsupportedCharacteristic(uuid.to_string()))?;
        self.decode(characteristic, bytes)
    }

    /// Decode a value for a known characteristic.
    pub fn decode(
        &self,
        characteristic: CharacteristicId,
        bytes: &[u8],
    ) -> Result<DecodedEvent, DecodeError> {
        trace!("Decoding {}: {:02X?}", characteristic, bytes);

        match characteristic {
            CharacteristicId::HeartRateMeasurement => {
                self.decode_heart_rate(bytes).map(DecodedEvent::HeartRate)
            }
            CharacteristicId::BodySensorLocation => {
                decode_body_sensor_location(bytes).map(DecodedEvent::BodySensorLocation)
            }
            CharacteristicId::BatteryLevel => {
                let mut reader = FieldReader::new(characteristic, bytes, self.word_order);
                reader.read_u8().map(DecodedEvent::BatteryLevel)
            }
            CharacteristicId::Manufacturer
            | CharacteristicId::ModelNumber
            | CharacteristicId::SerialNumber
            | CharacteristicId::HardwareRevision
            | CharacteristicId::FirmwareRevision => {
                let field = DeviceInfoField::from_characteristic(characteristic)
                    .ok_or_else(|| DecodeError::UnsupportedCharacteristic(characteristic.uuid()))?;
                decode_text(characteristic, bytes)
                    .map(|value| DecodedEvent::DeviceInfo { field, value })
            }
        }
    }

    /// Parse a Heart Rate Measurement value
    ///
    /// # Value Structure
    ///
    /// ```text
    /// [0]     : Flags
    ///           bit 0: heart-rate value format (0 = u8, 1 = u16)
    ///           bit 1: sensor contact detected
    ///           bit 2: sensor contact supported
    ///           bit 3: energy expended present
    ///           bit 4: RR-intervals present
    /// [1]     : Heart rate (u8)          if bit 0 clear
    /// [1-2]   : Heart rate (u16)         if bit 0 set
    /// [n-n+1] : Energy expended (u16, kJ) if bit 3 set
    /// [...]   : RR-intervals (u16 each, 1/1024 s) if bit 4 set, to the end
    /// ```
    fn decode_heart_rate(&self, bytes: &[u8]) -> Result<HeartRateMeasurement, DecodeError> {
        let mut reader = FieldReader::new(
            CharacteristicId::HeartRateMeasurement,
            bytes,
            self.word_order,
        );
        let flags = MeasurementFlags::from_bits_retain(reader.read_u8()?);

        let bpm = if flags.contains(MeasurementFlags::VALUE_U16) {
            reader.read_u16()?
        } else {
            u16::from(reader.read_u8()?)
        };

        let energy_expended_kj = if flags.contains(MeasurementFlags::ENERGY_EXPENDED) {
            Some(reader.read_u16()?)
        } else {
            None
        };

        let mut rr_intervals = Vec::new();
        if flags.contains(MeasurementFlags::RR_INTERVALS) {
            while !reader.is_empty() {
                rr_intervals.push(reader.read_u16()?);
            }
        }

        let sensor_contact = if !flags.contains(MeasurementFlags::SENSOR_CONTACT_SUPPORTED) {
            SensorContact::NotSupported
        } else if flags.contains(MeasurementFlags::SENSOR_CONTACT_DETECTED) {
            SensorContact::Detected
        } else {
            SensorContact::NotDetected
        };

        Ok(HeartRateMeasurement {
            bpm,
            energy_expended_kj,
            sensor_contact,
            rr_intervals,
        })
    }
}

/// Decode with the default (SIG little-endian) decoder.
pub fn decode(characteristic: CharacteristicId, bytes: &[u8]) -> Result<DecodedEvent, DecodeError> {
    Decoder::default().decode(characteristic, bytes)
}

fn decode_body_sensor_location(bytes: &[u8]) -> Result<BodySensorLocation, DecodeError> {
    let characteristic = CharacteristicId::BodySensorLocation;
    let value = FieldReader::new(characteristic, bytes, WordOrder::default()).read_u8()?;
    BodySensorLocation::from_u8(value).ok_or(DecodeError::UnknownEnumValue {
        characteristic,
        value,
    })
}

/// Device Information strings are UTF-8, sometimes NUL-padded by firmware.
fn decode_text(characteristic: CharacteristicId, bytes: &[u8]) -> Result<String, DecodeError> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidEncoding { characteristic })?;
    Ok(text.trim_end_matches('\0').to_string())
}

/// Sequential reader over a value that reports truncation precisely.
struct FieldReader<'a> {
    characteristic: CharacteristicId,
    bytes: &'a [u8],
    offset: usize,
    word_order: WordOrder,
}

impl<'a> FieldReader<'a> {
    fn new(characteristic: CharacteristicId, bytes: &'a [u8], word_order: WordOrder) -> Self {
        Self {
            characteristic,
            bytes,
            offset: 0,
            word_order,
        }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset + N;
        let field = self
            .bytes
            .get(self.offset..end)
            .and_then(|slice| <[u8; N]>::try_from(slice).ok())
            .ok_or(DecodeError::Truncated {
                characteristic: self.characteristic,
                needed: end,
                actual: self.bytes.len(),
            })?;
        self.offset = end;
        Ok(field)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let order = self.word_order;
        self.take::<2>().map(|b| order.read_u16(b))
    }
}
