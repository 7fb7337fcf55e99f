//! Platform Radio Adapter contract
//!
//! The operating system's BLE stack is not reimplemented here. A platform
//! binding implements [`RadioAdapter`] to receive fire-and-forget requests
//! from the monitor, and feeds the outcome of each request back later as a
//! [`RadioEvent`]. Events for one peripheral must be delivered in causal order.

use crate::domain::models::{AdapterState, PeripheralHandle, PeripheralId};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::uuids::{CharacteristicId, ServiceId};

/// Requests the monitor issues to the platform radio.
///
/// None of these block or return a result; completion arrives as a
/// [`RadioEvent`].
pub trait RadioAdapter {
    fn scan_start(&mut self, services: &[ServiceId]);
    fn scan_stop(&mut self);

    /// Look up a previously seen peripheral without scanning.
    fn retrieve_peripheral(&mut self, id: &PeripheralId) -> Option<PeripheralHandle>;

    fn connect(&mut self, peripheral: &PeripheralId);

    /// Drop a link or cancel a pending connect. Answered with
    /// [`RadioEvent::PeripheralDisconnected`] (or, for a cancelled connect,
    /// possibly [`RadioEvent::PeripheralConnectFailed`]) unless the adapter
    /// powers off first.
    fn disconnect(&mut self, peripheral: &PeripheralId);

    fn discover_services(&mut self, peripheral: &PeripheralId, services: &[ServiceId]);
    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralId,
        service: ServiceId,
        characteristics: &[CharacteristicId],
    );

    fn subscribe(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId);
    fn read_once(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId);
}

impl<A: RadioAdapter + ?Sized> RadioAdapter for Box<A> {
    fn scan_start(&mut self, services: &[ServiceId]) {
        (**self).scan_start(services)
    }

    fn scan_stop(&mut self) {
        (**self).scan_stop()
    }

    fn retrieve_peripheral(&mut self, id: &PeripheralId) -> Option<PeripheralHandle> {
        (**self).retrieve_peripheral(id)
    }

    fn connect(&mut self, peripheral: &PeripheralId) {
        (**self).connect(peripheral)
    }

    fn disconnect(&mut self, peripheral: &PeripheralId) {
        (**self).disconnect(peripheral)
    }

    fn discover_services(&mut self, peripheral: &PeripheralId, services: &[ServiceId]) {
        (**self).discover_services(peripheral, services)
    }

    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralId,
        service: ServiceId,
        characteristics: &[CharacteristicId],
    ) {
        (**self).discover_characteristics(peripheral, service, characteristics)
    }

    fn subscribe(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId) {
        (**self).subscribe(peripheral, characteristic)
    }

    fn read_once(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId) {
        (**self).read_once(peripheral, characteristic)
    }
}

/// Callbacks delivered by the platform radio.
///
/// Service and characteristic UUIDs are passed as the platform reports them;
/// the monitor resolves them against the catalog and ignores the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    PowerStateChanged {
        state: AdapterState,
    },
    PeripheralDiscovered {
        peripheral: PeripheralHandle,
        rssi: Option<i16>,
    },
    PeripheralConnected {
        peripheral: PeripheralId,
    },
    PeripheralConnectFailed {
        peripheral: PeripheralId,
        error: TransportError,
    },
    PeripheralDisconnected {
        peripheral: PeripheralId,
        error: Option<TransportError>,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        services: Result<Vec<String>, TransportError>,
    },
    CharacteristicsDiscovered {
        peripheral: PeripheralId,
        service: String,
        characteristics: Result<Vec<String>, TransportError>,
    },
    CharacteristicValue {
        peripheral: PeripheralId,
        characteristic: String,
        value: Result<Vec<u8>, TransportError>,
    },
    /// The system reattached an already connected peripheral.
    StateRestored {
        peripheral: PeripheralHandle,
    },
}

/// Adapter double that records requests, for tests.
#[cfg(test)]
pub mod recording {
    use super::*;

    /// A single request as seen by a recording adapter.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RadioCommand {
        ScanStart(Vec<ServiceId>),
        ScanStop,
        Connect(PeripheralId),
        Disconnect(PeripheralId),
        DiscoverServices(PeripheralId, Vec<ServiceId>),
        DiscoverCharacteristics(PeripheralId, ServiceId, Vec<CharacteristicId>),
        Subscribe(PeripheralId, CharacteristicId),
        ReadOnce(PeripheralId, CharacteristicId),
    }

    /// Adapter that only records what it was asked to do.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingRadio {
        pub commands: Vec<RadioCommand>,
        /// Peripherals `retrieve_peripheral` can resolve.
        pub known: Vec<PeripheralHandle>,
    }

    impl RecordingRadio {
        pub fn new() -> Self {
            Self::default()
        }

        /// Drain the recorded commands.
        pub fn take(&mut self) -> Vec<RadioCommand> {
            std::mem::take(&mut self.commands)
        }
    }

    impl RadioAdapter for RecordingRadio {
        fn scan_start(&mut self, services: &[ServiceId]) {
            self.commands.push(RadioCommand::ScanStart(services.to_vec()));
        }

        fn scan_stop(&mut self) {
            self.commands.push(RadioCommand::ScanStop);
        }

        fn retrieve_peripheral(&mut self, id: &PeripheralId) -> Option<PeripheralHandle> {
            self.known.iter().find(|p| &p.id == id).cloned()
        }

        fn connect(&mut self, peripheral: &PeripheralId) {
            self.commands.push(RadioCommand::Connect(peripheral.clone()));
        }

        fn disconnect(&mut self, peripheral: &PeripheralId) {
            self.commands.push(RadioCommand::Disconnect(peripheral.clone()));
        }

        fn discover_services(&mut self, peripheral: &PeripheralId, services: &[ServiceId]) {
            self.commands.push(RadioCommand::DiscoverServices(
                peripheral.clone(),
                services.to_vec(),
            ));
        }

        fn discover_characteristics(
            &mut self,
            peripheral: &PeripheralId,
            service: ServiceId,
            characteristics: &[CharacteristicId],
        ) {
            self.commands.push(RadioCommand::DiscoverCharacteristics(
                peripheral.clone(),
                service,
                characteristics.to_vec(),
            ));
        }

        fn subscribe(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId) {
            self.commands
                .push(RadioCommand::Subscribe(peripheral.clone(), characteristic));
        }

        fn read_once(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId) {
            self.commands
                .push(RadioCommand::ReadOnce(peripheral.clone(), characteristic));
        }
    }
}
