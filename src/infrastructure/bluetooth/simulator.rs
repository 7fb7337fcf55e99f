//! Simulated heart-rate strap
//!
//! An in-process [`RadioAdapter`] that answers every request the way a real
//! chest strap would, by posting the matching [`RadioEvent`] back onto the
//! event channel. Once the Heart Rate Measurement characteristic is
//! subscribed it streams SIG-encoded measurements at a fixed interval.

use crate::domain::models::{AdapterState, BodySensorLocation, PeripheralHandle, PeripheralId};
use crate::error::TransportError;
use crate::infrastructure::bluetooth::adapter::{RadioAdapter, RadioEvent};
use crate::infrastructure::bluetooth::protocol::MeasurementFlags;
use crate::infrastructure::bluetooth::uuids::{CharacteristicId, ServiceId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// What the simulated strap reports about itself.
#[derive(Debug, Clone)]
pub struct SimulatedStrap {
    pub peripheral: PeripheralHandle,
    pub rssi: i16,
    pub base_bpm: u16,
    pub notify_interval: Duration,
    pub battery_level: u8,
    pub location: BodySensorLocation,
    pub manufacturer: String,
    pub model_number: String,
    pub serial_number: String,
    pub hardware_revision: String,
    pub firmware_revision: String,
}

impl Default for SimulatedStrap {
    fn default() -> Self {
        Self {
            peripheral: PeripheralHandle::new("sim-hrm-0001", Some("Simulated HRM")),
            rssi: -58,
            base_bpm: 72,
            notify_interval: Duration::from_millis(1000),
            battery_level: 87,
            location: BodySensorLocation::Chest,
            manufacturer: "Acme Sensors".to_string(),
            model_number: "HRM-1".to_string(),
            serial_number: "0001".to_string(),
            hardware_revision: "B".to_string(),
            firmware_revision: "1.4.2".to_string(),
        }
    }
}

impl SimulatedStrap {
    /// Raw attribute value for a one-shot read.
    fn read(&self, characteristic: CharacteristicId) -> Vec<u8> {
        match characteristic {
            CharacteristicId::HeartRateMeasurement => encode_measurement(self.base_bpm, None),
            CharacteristicId::BodySensorLocation => vec![self.location as u8],
            CharacteristicId::BatteryLevel => vec![self.battery_level],
            CharacteristicId::Manufacturer => self.manufacturer.as_bytes().to_vec(),
            CharacteristicId::ModelNumber => self.model_number.as_bytes().to_vec(),
            CharacteristicId::SerialNumber => self.serial_number.as_bytes().to_vec(),
            CharacteristicId::HardwareRevision => self.hardware_revision.as_bytes().to_vec(),
            CharacteristicId::FirmwareRevision => self.firmware_revision.as_bytes().to_vec(),
        }
    }
}

/// Encode a Heart Rate Measurement the way the SIG specifies it.
fn encode_measurement(bpm: u16, energy_expended_kj: Option<u16>) -> Vec<u8> {
    let mut flags = MeasurementFlags::SENSOR_CONTACT_SUPPORTED
        | MeasurementFlags::SENSOR_CONTACT_DETECTED
        | MeasurementFlags::RR_INTERVALS;
    let mut value = vec![0];

    match u8::try_from(bpm) {
        Ok(bpm) => value.push(bpm),
        Err(_) => {
            flags |= MeasurementFlags::VALUE_U16;
            value.extend_from_slice(&bpm.to_le_bytes());
        }
    }
    if let Some(energy) = energy_expended_kj {
        flags |= MeasurementFlags::ENERGY_EXPENDED;
        value.extend_from_slice(&energy.to_le_bytes());
    }
    let rr_interval = (60 * 1024 / u32::from(bpm.max(1))) as u16;
    value.extend_from_slice(&rr_interval.to_le_bytes());

    value[0] = flags.bits();
    value
}

/// Rate for the `sample`-th notification: a gentle oscillation above `base_bpm`.
fn sample_bpm(base_bpm: u16, sample: u16) -> u16 {
    let offset = [0u16, 1, 3, 4, 3, 1][usize::from(sample % 6)];
    base_bpm.saturating_add(offset)
}

pub struct SimulatedRadio {
    strap: SimulatedStrap,
    event_sender: mpsc::UnboundedSender<RadioEvent>,
    scanning: bool,
    connected: bool,
    notifier: Option<JoinHandle<()>>,
}

impl SimulatedRadio {
    pub fn new(strap: SimulatedStrap, event_sender: mpsc::UnboundedSender<RadioEvent>) -> Self {
        Self {
            strap,
            event_sender,
            scanning: false,
            connected: false,
            notifier: None,
        }
    }

    /// Report an adapter power state change, as the platform would at startup.
    pub fn set_power_state(&self, state: AdapterState) {
        self.emit(RadioEvent::PowerStateChanged { state });
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn emit(&self, event: RadioEvent) {
        trace!("Simulated radio -> {:?}", event);
        if self.event_sender.send(event).is_err() {
            debug!("Simulated radio has no listener");
        }
    }

    fn is_strap(&self, id: &PeripheralId) -> bool {
        &self.strap.peripheral.id == id
    }

    fn stop_notifications(&mut self) {
        if let Some(notifier) = self.notifier.take() {
            notifier.abort();
        }
    }

    fn start_notifications(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime; simulated notifications disabled");
            return;
        };
        self.stop_notifications();

        let sender = self.event_sender.clone();
        let peripheral = self.strap.peripheral.id.clone();
        let base_bpm = self.strap.base_bpm;
        let period = self.strap.notify_interval;

        self.notifier = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut sample: u16 = 0;
            loop {
                interval.tick().await;
                let energy = (sample % 10 == 0).then_some(sample / 10);
                let event = RadioEvent::CharacteristicValue {
                    peripheral: peripheral.clone(),
                    characteristic: CharacteristicId::HeartRateMeasurement.uuid(),
                    value: Ok(encode_measurement(sample_bpm(base_bpm, sample), energy)),
                };
                if sender.send(event).is_err() {
                    break;
                }
                sample = sample.wrapping_add(1);
            }
        }));
    }
}

impl Drop for SimulatedRadio {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}

impl RadioAdapter for SimulatedRadio {
    fn scan_start(&mut self, services: &[ServiceId]) {
        self.scanning = true;
        if services.contains(&ServiceId::HeartRate) {
            self.emit(RadioEvent::PeripheralDiscovered {
                peripheral: self.strap.peripheral.clone(),
                rssi: Some(self.strap.rssi),
            });
        }
    }

    fn scan_stop(&mut self) {
        self.scanning = false;
    }

    fn retrieve_peripheral(&mut self, id: &PeripheralId) -> Option<PeripheralHandle> {
        self.is_strap(id).then(|| self.strap.peripheral.clone())
    }

    fn connect(&mut self, peripheral: &PeripheralId) {
        if self.is_strap(peripheral) {
            self.connected = true;
            self.emit(RadioEvent::PeripheralConnected {
                peripheral: peripheral.clone(),
            });
        } else {
            self.emit(RadioEvent::PeripheralConnectFailed {
                peripheral: peripheral.clone(),
                error: TransportError::ConnectFailed("unknown peripheral".to_string()),
            });
        }
    }

    fn disconnect(&mut self, peripheral: &PeripheralId) {
        if !self.is_strap(peripheral) {
            return;
        }
        self.stop_notifications();
        self.connected = false;
        self.emit(RadioEvent::PeripheralDisconnected {
            peripheral: peripheral.clone(),
            error: None,
        });
    }

    fn discover_services(&mut self, peripheral: &PeripheralId, services: &[ServiceId]) {
        // The strap also exposes Generic Access, which the filter normally hides
        let mut uuids: Vec<String> = services.iter().map(|s| s.uuid()).collect();
        uuids.push("1800".to_string());
        self.emit(RadioEvent::ServicesDiscovered {
            peripheral: peripheral.clone(),
            services: Ok(uuids),
        });
    }

    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralId,
        service: ServiceId,
        characteristics: &[CharacteristicId],
    ) {
        let uuids = characteristics
            .iter()
            .filter(|c| c.service() == service)
            .map(|c| c.uuid())
            .collect();
        self.emit(RadioEvent::CharacteristicsDiscovered {
            peripheral: peripheral.clone(),
            service: service.uuid(),
            characteristics: Ok(uuids),
        });
    }

    fn subscribe(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId) {
        if self.is_strap(peripheral) && characteristic == CharacteristicId::HeartRateMeasurement {
            debug!("Simulated strap streaming measurements");
            self.start_notifications();
        }
    }

    fn read_once(&mut self, peripheral: &PeripheralId, characteristic: CharacteristicId) {
        self.emit(RadioEvent::CharacteristicValue {
            peripheral: peripheral.clone(),
            characteristic: characteristic.uuid(),
            value: Ok(self.strap.read(characteristic)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        AppEvent, ConnectionPhase, DecodedEvent, DeviceInfoField, SensorContact,
    };
    use crate::domain::sink::ChannelSink;
    use crate::infrastructure::bluetooth::monitor::HeartRateMonitor;
    use crate::infrastructure::bluetooth::protocol::decode;
    use crate::infrastructure::bluetooth::service;

    fn fast_strap() -> SimulatedStrap {
        SimulatedStrap {
            notify_interval: Duration::from_millis(5),
            ..SimulatedStrap::default()
        }
    }

    #[test]
    fn test_encoded_measurement_decodes() {
        let event = decode(
            CharacteristicId::HeartRateMeasurement,
            &encode_measurement(64, Some(12)),
        )
        .unwrap();
        match event {
            DecodedEvent::HeartRate(m) => {
                assert_eq!(m.bpm, 64);
                assert_eq!(m.energy_expended_kj, Some(12));
                assert_eq!(m.sensor_contact, SensorContact::Detected);
                assert_eq!(m.rr_intervals, vec![960]);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // Rates above 255 switch to the 16-bit format
        let wide = encode_measurement(300, None);
        assert!(wide[0] & MeasurementFlags::VALUE_U16.bits() != 0);
        assert_eq!(&wide[1..3], &[0x2C, 0x01]);
    }

    #[test]
    fn test_sample_bpm_oscillates_and_saturates() {
        let rates: Vec<u16> = (0..6).map(|n| sample_bpm(72, n)).collect();
        assert_eq!(rates, vec![72, 73, 75, 76, 75, 73]);
        assert_eq!(sample_bpm(u16::MAX - 1, 3), u16::MAX);

        let wide = encode_measurement(sample_bpm(u16::MAX, 2), None);
        assert_eq!(&wide[1..3], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_disconnect_is_always_acknowledged() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let strap = SimulatedStrap::default();
        let id = strap.peripheral.id.clone();
        let mut radio = SimulatedRadio::new(strap, tx);

        // Cancelling before any connection still produces an acknowledgement
        radio.disconnect(&id);
        assert_eq!(
            rx.try_recv().unwrap(),
            RadioEvent::PeripheralDisconnected {
                peripheral: id.clone(),
                error: None,
            }
        );

        radio.disconnect(&PeripheralId::new("someone-else"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_end_to_end_session() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let (app_tx, mut app_rx) = mpsc::unbounded_channel();
        let strap = fast_strap();
        let strap_id = strap.peripheral.id.clone();

        let radio = SimulatedRadio::new(strap, radio_tx);
        radio.set_power_state(AdapterState::PoweredOn);
        let monitor = HeartRateMonitor::new(radio, Box::new(ChannelSink::new(app_tx)));
        let handle = service::spawn(monitor, radio_rx);
        handle.start().unwrap();

        let mut heart_rates = 0;
        let mut battery = None;
        let mut manufacturer = None;
        let mut active = false;
        let collect = async {
            while let Some(event) = app_rx.recv().await {
                match event {
                    AppEvent::HeartRate(m) => {
                        assert!((72..=76).contains(&m.bpm));
                        heart_rates += 1;
                    }
                    AppEvent::BatteryLevel(level) => battery = Some(level),
                    AppEvent::DeviceInfo {
                        field: DeviceInfoField::Manufacturer,
                        value,
                    } => manufacturer = Some(value),
                    AppEvent::Phase(ConnectionPhase::Active) => active = true,
                    _ => {}
                }
                if heart_rates >= 3 && battery.is_some() && manufacturer.is_some() {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect)
            .await
            .unwrap();

        assert!(active);
        assert_eq!(battery, Some(87));
        assert_eq!(manufacturer.as_deref(), Some("Acme Sensors"));

        let monitor = handle.shutdown().await.unwrap();
        assert!(monitor.registry().contains(&strap_id));
        assert!(!monitor.adapter().is_connected());
    }

    #[tokio::test]
    async fn test_known_strap_reconnects_without_scanning() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let (app_tx, mut app_rx) = mpsc::unbounded_channel();
        let strap = fast_strap();
        let registry = [strap.peripheral.id.as_str()].into_iter().collect();

        let radio = SimulatedRadio::new(strap, radio_tx);
        radio.set_power_state(AdapterState::PoweredOn);
        let monitor = HeartRateMonitor::new(radio, Box::new(ChannelSink::new(app_tx)))
            .with_registry(registry);
        let handle = service::spawn(monitor, radio_rx);
        handle.start().unwrap();

        let mut phases = Vec::new();
        let collect = async {
            while let Some(event) = app_rx.recv().await {
                if let AppEvent::Phase(phase) = event {
                    phases.push(phase);
                    if phase == ConnectionPhase::Active {
                        break;
                    }
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect)
            .await
            .unwrap();

        assert_eq!(
            phases,
            vec![
                ConnectionPhase::Connecting,
                ConnectionPhase::Discovering,
                ConnectionPhase::Active
            ]
        );
        let monitor = handle.shutdown().await.unwrap();
        assert!(!monitor.adapter().is_scanning());
    }
}
