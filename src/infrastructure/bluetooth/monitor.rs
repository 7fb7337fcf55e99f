//! Heart Rate Monitor connection state machine
//!
//! ```text
//!            power on                discovered           connected
//!   Idle ──────────────▶ Scanning ──────────────▶ Connecting ─────────▶ Discovering
//!    ▲   (known peer) ─────────────────────────────▶  │                     │
//!    │                      ▲         connect failed  │                     │ all characteristics
//!    │ power off            └─────────────────────────┘                     ▼ resolved
//!    └──────────────── any ◀──── disconnected (reconnect / scan) ────── Active
//! ```
//!
//! Every platform callback goes through [`HeartRateMonitor::handle`], one at a
//! time. Requests to the radio are fire-and-forget; their outcome arrives as a
//! later event. Callbacks for a peripheral that is not the current session's
//! are dropped. So are callbacks for a peripheral whose disconnect we
//! requested in an earlier session, until the adapter acknowledges it.

use crate::domain::models::{AdapterState, ConnectionPhase, PeripheralHandle, PeripheralId};
use crate::domain::registry::KnownPeripheralRegistry;
use crate::domain::sink::{dispatch, EventSink};
use crate::error::{CapabilityError, MonitorError, TransportError};
use crate::infrastructure::bluetooth::adapter::{RadioAdapter, RadioEvent};
use crate::infrastructure::bluetooth::discovery::{
    characteristics_to_discover, discovery_action, DiscoveryAction,
};
use crate::infrastructure::bluetooth::protocol::Decoder;
use crate::infrastructure::bluetooth::uuids::{CharacteristicId, ServiceId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

/// Live binding between the monitor and one peripheral.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSession {
    adapter_state: AdapterState,
    peripheral: Option<PeripheralHandle>,
    pending_services: HashSet<ServiceId>,
    resolved: Vec<CharacteristicId>,
    generation: u64,
}

impl ConnectionSession {
    pub fn adapter_state(&self) -> AdapterState {
        self.adapter_state
    }

    pub fn peripheral(&self) -> Option<&PeripheralHandle> {
        self.peripheral.as_ref()
    }

    /// Services whose characteristic discovery has not completed yet.
    pub fn pending_services(&self) -> &HashSet<ServiceId> {
        &self.pending_services
    }

    /// Characteristics found so far, in discovery order.
    pub fn resolved(&self) -> &[CharacteristicId] {
        &self.resolved
    }

    /// Bumped every time the session is torn down.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn is_current(&self, id: &PeripheralId) -> bool {
        self.peripheral.as_ref().is_some_and(|p| &p.id == id)
    }

    fn select(&mut self, peripheral: PeripheralHandle) {
        self.peripheral = Some(peripheral);
        self.pending_services.clear();
        self.resolved.clear();
    }

    fn reset(&mut self) {
        self.peripheral = None;
        self.pending_services.clear();
        self.resolved.clear();
        self.generation += 1;
    }
}

pub struct HeartRateMonitor<A: RadioAdapter> {
    adapter: A,
    sink: Box<dyn EventSink>,
    decoder: Decoder,
    registry: KnownPeripheralRegistry,
    session: ConnectionSession,
    phase: ConnectionPhase,
    armed: bool,
    /// Restored by the system before `start()`; adopted on start.
    restored: Option<PeripheralHandle>,
    /// Peripherals we asked to disconnect whose acknowledgement is outstanding,
    /// with the generation of the session that asked.
    pending_disconnects: HashMap<PeripheralId, u64>,
}

impl<A: RadioAdapter> HeartRateMonitor<A> {
    pub fn new(adapter: A, sink: Box<dyn EventSink>) -> Self {
        Self {
            adapter,
            sink,
            decoder: Decoder::default(),
            registry: KnownPeripheralRegistry::new(),
            session: ConnectionSession::default(),
            phase: ConnectionPhase::Idle,
            armed: false,
            restored: None,
            pending_disconnects: HashMap::new(),
        }
    }

    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_registry(mut self, registry: KnownPeripheralRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn registry(&self) -> &KnownPeripheralRegistry {
        &self.registry
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Swap the event sink, returning the previous one.
    pub fn replace_sink(&mut self, sink: Box<dyn EventSink>) -> Box<dyn EventSink> {
        std::mem::replace(&mut self.sink, sink)
    }

    /// Arm the monitor. Scanning begins as soon as the adapter is powered on.
    pub fn start(&mut self) {
        if self.armed {
            return;
        }
        info!("Starting heart rate monitor");
        self.armed = true;

        if let Some(peripheral) = self.restored.take() {
            self.adopt(peripheral);
            return;
        }
        self.apply_adapter_state();
    }

    /// Disarm the monitor, stopping any scan or connection.
    pub fn stop(&mut self) {
        if !self.armed {
            return;
        }
        info!("Stopping heart rate monitor");
        self.teardown(true);
        self.armed = false;
        self.set_phase(ConnectionPhase::Idle);
    }

    /// Process one platform callback.
    pub fn handle(&mut self, event: RadioEvent) {
        trace!("Radio event: {:?}", event);
        match event {
            RadioEvent::PowerStateChanged { state } => self.on_power_state(state),
            RadioEvent::PeripheralDiscovered { peripheral, rssi } => {
                self.on_peripheral_discovered(peripheral, rssi)
            }
            RadioEvent::PeripheralConnected { peripheral } => self.on_connected(peripheral),
            RadioEvent::PeripheralConnectFailed { peripheral, error } => {
                self.on_connect_failed(peripheral, error)
            }
            RadioEvent::PeripheralDisconnected { peripheral, error } => {
                self.on_disconnected(peripheral, error)
            }
            RadioEvent::ServicesDiscovered {
                peripheral,
                services,
            } => self.on_services_discovered(peripheral, services),
            RadioEvent::CharacteristicsDiscovered {
                peripheral,
                service,
                characteristics,
            } => self.on_characteristics_discovered(peripheral, service, characteristics),
            RadioEvent::CharacteristicValue {
                peripheral,
                characteristic,
                value,
            } => self.on_characteristic_value(peripheral, characteristic, value),
            RadioEvent::StateRestored { peripheral } => self.on_state_restored(peripheral),
        }
    }

    fn on_power_state(&mut self, state: AdapterState) {
        let previous = std::mem::replace(&mut self.session.adapter_state, state);
        if previous != state {
            info!("Bluetooth adapter state: {:?} -> {:?}", previous, state);
        }
        if self.armed {
            self.apply_adapter_state();
        }
    }

    fn apply_adapter_state(&mut self) {
        match self.session.adapter_state {
            AdapterState::PoweredOn => match self.phase {
                ConnectionPhase::Idle | ConnectionPhase::Halted => self.resume(),
                phase => debug!("Adapter powered on while {}, nothing to do", phase),
            },
            AdapterState::PoweredOff | AdapterState::Resetting => {
                self.teardown(false);
                self.set_phase(ConnectionPhase::Idle);
            }
            AdapterState::Unauthorized => self.halt(CapabilityError::Unauthorized),
            AdapterState::Unsupported => self.halt(CapabilityError::Unsupported),
            AdapterState::Unknown => {}
        }
    }

    fn halt(&mut self, error: CapabilityError) {
        if self.phase == ConnectionPhase::Halted {
            return;
        }
        warn!("Bluetooth unavailable: {}", error);
        self.teardown(false);
        self.set_phase(ConnectionPhase::Halted);
        self.sink.on_capability_error(&MonitorError::Capability(error));
    }

    /// Idle -> Scanning entry: prefer a direct reconnect to the last known peer.
    fn resume(&mut self) {
        if !self.armed || self.session.adapter_state != AdapterState::PoweredOn {
            self.set_phase(ConnectionPhase::Idle);
            return;
        }

        if let Some(id) = self.registry.most_recent().cloned() {
            match self.adapter.retrieve_peripheral(&id) {
                Some(peripheral) => {
                    info!("Reconnecting to known peripheral {}", peripheral.display_name());
                    self.connect(peripheral);
                    return;
                }
                None => debug!("Known peripheral {} unavailable, scanning instead", id),
            }
        }
        self.start_scan();
    }

    fn start_scan(&mut self) {
        if self.phase == ConnectionPhase::Scanning {
            debug!("Scan already running");
            return;
        }
        info!("Scanning for heart rate peripherals...");
        self.adapter.scan_start(&ServiceId::ALL);
        self.set_phase(ConnectionPhase::Scanning);
    }

    fn connect(&mut self, peripheral: PeripheralHandle) {
        info!("Connecting to {}", peripheral.display_name());
        self.adapter.connect(&peripheral.id);
        self.session.select(peripheral);
        self.set_phase(ConnectionPhase::Connecting);
    }

    /// Cancel whatever the current session is doing and clear it.
    ///
    /// Without `expect_ack` the adapter has lost every link on its own and no
    /// acknowledgement will follow, for this session or any earlier one.
    fn teardown(&mut self, expect_ack: bool) {
        match self.phase {
            ConnectionPhase::Scanning => self.adapter.scan_stop(),
            ConnectionPhase::Connecting
            | ConnectionPhase::Discovering
            | ConnectionPhase::Active => {
                if let Some(peripheral) = self.session.peripheral.take() {
                    self.adapter.disconnect(&peripheral.id);
                    if expect_ack {
                        self.await_ack(peripheral.id);
                    }
                }
            }
            ConnectionPhase::Idle | ConnectionPhase::Halted => {}
        }
        if !expect_ack {
            self.pending_disconnects.clear();
        }
        self.session.reset();
    }

    /// Remember a disconnect requested by the current session.
    fn await_ack(&mut self, id: PeripheralId) {
        self.pending_disconnects.insert(id, self.session.generation);
    }

    /// Generation of an earlier session still waiting on its disconnect of `id`.
    ///
    /// The adapter delivers callbacks per peripheral in causal order, so until
    /// that acknowledgement arrives everything reported for `id` belongs to
    /// the old link.
    fn awaiting_ack(&self, id: &PeripheralId) -> Option<u64> {
        self.pending_disconnects
            .get(id)
            .copied()
            .filter(|&generation| generation < self.session.generation)
    }

    /// Callback belongs to the current session's link.
    fn is_live(&self, id: &PeripheralId) -> bool {
        self.session.is_current(id) && self.awaiting_ack(id).is_none()
    }

    fn on_peripheral_discovered(&mut self, peripheral: PeripheralHandle, rssi: Option<i16>) {
        if self.phase != ConnectionPhase::Scanning {
            trace!("Ignoring discovery of {} while {}", peripheral.id, self.phase);
            return;
        }
        info!(
            "Discovered {} (RSSI: {})",
            peripheral.display_name(),
            rssi.map_or_else(|| "n/a".to_string(), |r| format!("{} dBm", r))
        );
        self.adapter.scan_stop();
        self.connect(peripheral);
    }

    fn on_connected(&mut self, id: PeripheralId) {
        if self.phase != ConnectionPhase::Connecting || !self.is_live(&id) {
            debug!("Ignoring stale connection of {}", id);
            return;
        }
        info!("Connected to {}", id);
        self.registry.record(&id);
        self.adapter.discover_services(&id, &ServiceId::ALL);
        self.set_phase(ConnectionPhase::Discovering);
    }

    fn on_connect_failed(&mut self, id: PeripheralId, error: TransportError) {
        if let Some(generation) = self.awaiting_ack(&id) {
            // A cancelled attempt may be reported as a failure instead
            self.pending_disconnects.remove(&id);
            debug!("Cancelled connect of {} (session {}) reported failed", id, generation);
            return;
        }
        if self.phase != ConnectionPhase::Connecting || !self.session.is_current(&id) {
            debug!("Ignoring stale connection failure of {}", id);
            return;
        }
        warn!("Connecting to {} failed: {}", id, error);
        self.session.reset();
        self.start_scan();
    }

    fn on_disconnected(&mut self, id: PeripheralId, error: Option<TransportError>) {
        if let Some(generation) = self.awaiting_ack(&id) {
            self.pending_disconnects.remove(&id);
            debug!("Disconnect of {} (session {}) acknowledged", id, generation);
            return;
        }
        if !self.session.is_current(&id) {
            debug!("Ignoring disconnect of {}", id);
            return;
        }

        match error {
            Some(error) => warn!("Disconnected from {}: {}", id, error),
            None => info!("Disconnected from {}", id),
        }
        self.session.reset();
        self.resume();
    }

    fn on_services_discovered(
        &mut self,
        id: PeripheralId,
        services: Result<Vec<String>, TransportError>,
    ) {
        if self.phase != ConnectionPhase::Discovering || !self.is_live(&id) {
            debug!("Ignoring stale service discovery for {}", id);
            return;
        }
        let services = match services {
            Ok(services) => services,
            Err(error) => return self.abandon(&id, error),
        };

        for uuid in &services {
            let plan = ServiceId::from_uuid(uuid)
                .and_then(|service| characteristics_to_discover(service).map(|c| (service, c)));
            match plan {
                Some((service, characteristics)) => {
                    if self.session.pending_services.insert(service) {
                        debug!("Discovering characteristics of {} service", service);
                        self.adapter
                            .discover_characteristics(&id, service, characteristics);
                    }
                }
                None => debug!("Ignoring service {}", uuid),
            }
        }

        if self.session.pending_services.is_empty() {
            warn!("{} exposes none of the expected services", id);
            self.activate();
        }
    }

    fn on_characteristics_discovered(
        &mut self,
        id: PeripheralId,
        service_uuid: String,
        characteristics: Result<Vec<String>, TransportError>,
    ) {
        if self.phase != ConnectionPhase::Discovering || !self.is_live(&id) {
            debug!("Ignoring stale characteristic discovery for {}", id);
            return;
        }
        let Some(service) = ServiceId::from_uuid(&service_uuid) else {
            debug!("Ignoring characteristics of unknown service {}", service_uuid);
            return;
        };
        if !self.session.pending_services.remove(&service) {
            debug!("Unexpected characteristics for {} service", service);
            return;
        }
        let characteristics = match characteristics {
            Ok(characteristics) => characteristics,
            Err(error) => return self.abandon(&id, error),
        };

        let wanted = characteristics_to_discover(service).unwrap_or(&[]);
        for uuid in &characteristics {
            match CharacteristicId::from_uuid(uuid) {
                Some(c) if wanted.contains(&c) && !self.session.resolved.contains(&c) => {
                    self.session.resolved.push(c)
                }
                _ => trace!("Skipping characteristic {} of {} service", uuid, service),
            }
        }

        if self.session.pending_services.is_empty() {
            self.activate();
        }
    }

    /// All characteristic discovery finished: subscribe and read.
    fn activate(&mut self) {
        let Some(peripheral) = self.session.peripheral.clone() else {
            return;
        };
        for characteristic in self.session.resolved.clone() {
            match discovery_action(characteristic) {
                DiscoveryAction::Subscribe => {
                    debug!("Subscribing to {}", characteristic);
                    self.adapter.subscribe(&peripheral.id, characteristic);
                }
                DiscoveryAction::ReadOnce => {
                    debug!("Reading {}", characteristic);
                    self.adapter.read_once(&peripheral.id, characteristic);
                }
            }
        }
        info!(
            "{} ready ({} characteristics)",
            peripheral.display_name(),
            self.session.resolved.len()
        );
        self.set_phase(ConnectionPhase::Active);
    }

    /// Discovery failed: drop the peer and go back to scanning.
    fn abandon(&mut self, id: &PeripheralId, error: TransportError) {
        warn!("Discovery on {} failed: {}", id, error);
        self.adapter.disconnect(id);
        self.await_ack(id.clone());
        self.session.reset();
        self.start_scan();
    }

    fn on_characteristic_value(
        &mut self,
        id: PeripheralId,
        characteristic: String,
        value: Result<Vec<u8>, TransportError>,
    ) {
        if self.phase != ConnectionPhase::Active || !self.is_live(&id) {
            trace!("Dropping {} value from {} while {}", characteristic, id, self.phase);
            return;
        }
        let bytes = match value {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!("Reading {} failed: {}", characteristic, error);
                return;
            }
        };

        match self.decoder.decode_uuid(&characteristic, &bytes) {
            Ok(event) => dispatch(self.sink.as_mut(), &event),
            Err(error) => {
                warn!(
                    "Could not decode {} value {:02X?}: {}",
                    characteristic, bytes, error
                );
                self.sink.on_capability_error(&MonitorError::Decode(error));
            }
        }
    }

    fn on_state_restored(&mut self, peripheral: PeripheralHandle) {
        if !self.armed {
            debug!("Holding restored peripheral {} until start", peripheral.id);
            self.restored = Some(peripheral);
            return;
        }
        self.adopt(peripheral);
    }

    /// Take over a peripheral the system kept connected for us.
    fn adopt(&mut self, peripheral: PeripheralHandle) {
        if !self.session.is_current(&peripheral.id) {
            self.teardown(true);
        }
        // The system holds this link for us; nothing older is outstanding
        self.pending_disconnects.remove(&peripheral.id);
        info!("Restored connection to {}", peripheral.display_name());
        self.registry.record(&peripheral.id);
        self.session.select(peripheral);
        self.set_phase(ConnectionPhase::Active);
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.phase != phase {
            debug!("Phase: {} -> {}", self.phase, phase);
            self.phase = phase;
            self.sink.on_phase_changed(phase);
        }
    }
}
