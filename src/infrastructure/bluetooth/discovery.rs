//! Characteristic discovery plan per service.

use crate::infrastructure::bluetooth::uuids::{CharacteristicId, ServiceId};

/// What to do with a characteristic once it has been discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryAction {
    /// Enable notifications and keep receiving values.
    Subscribe,
    /// Read the value a single time.
    ReadOnce,
}

/// Characteristics to discover for a service, in request order.
///
/// Returns `None` for services outside the catalog; those are ignored.
pub fn characteristics_to_discover(service: ServiceId) -> Option<&'static [CharacteristicId]> {
    let characteristics: &'static [CharacteristicId] = match service {
        ServiceId::HeartRate => &[
            CharacteristicId::HeartRateMeasurement,
            CharacteristicId::BodySensorLocation,
        ],
        ServiceId::Battery => &[CharacteristicId::BatteryLevel],
        ServiceId::DeviceInfo => &[
            CharacteristicId::Manufacturer,
            CharacteristicId::ModelNumber,
            CharacteristicId::SerialNumber,
            CharacteristicId::HardwareRevision,
            CharacteristicId::FirmwareRevision,
        ],
    };
    Some(characteristics)
}

/// Same as [`characteristics_to_discover`] for a raw service UUID.
pub fn characteristics_for_uuid(service_uuid: &str) -> Option<&'static [CharacteristicId]> {
    ServiceId::from_uuid(service_uuid).and_then(characteristics_to_discover)
}

pub fn discovery_action(characteristic: CharacteristicId) -> DiscoveryAction {
    match characteristic {
        CharacteristicId::HeartRateMeasurement => DiscoveryAction::Subscribe,
        _ => DiscoveryAction::ReadOnce,
    }
}
