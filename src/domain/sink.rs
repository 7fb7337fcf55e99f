//! Event Sink
//!
//! Outbound notifications from the monitor. Every method defaults to a
//! no-op, so a sink only implements the events it cares about. Sinks are
//! combined by composition ([`FanoutSink`], [`ModalSink`]) and can be swapped
//! on a running monitor.

use crate::domain::models::{
    AppEvent, BodySensorLocation, ConnectionPhase, DecodedEvent, DeviceInfoField,
    HeartRateMeasurement, MessageSeverity, StatusMessage,
};
use crate::error::MonitorError;
use tokio::sync::mpsc;

pub trait EventSink: Send {
    fn on_heart_rate(&mut self, _measurement: &HeartRateMeasurement) {}

    fn on_battery_level(&mut self, _percent: u8) {}

    fn on_body_sensor_location(&mut self, _location: BodySensorLocation) {}

    fn on_device_info(&mut self, _field: DeviceInfoField, _value: &str) {}

    /// Decode failures and fatal adapter conditions.
    fn on_capability_error(&mut self, _error: &MonitorError) {}

    fn on_phase_changed(&mut self, _phase: ConnectionPhase) {}
}

/// Route a decoded value to the matching sink method.
pub fn dispatch(sink: &mut dyn EventSink, event: &DecodedEvent) {
    match event {
        DecodedEvent::HeartRate(measurement) => sink.on_heart_rate(measurement),
        DecodedEvent::BodySensorLocation(location) => sink.on_body_sensor_location(*location),
        DecodedEvent::BatteryLevel(percent) => sink.on_battery_level(*percent),
        DecodedEvent::DeviceInfo { field, value } => sink.on_device_info(*field, value),
    }
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// Forwards every notification as an [`AppEvent`] over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelSink {
    pub fn new(event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { event_sender }
    }

    fn send(&self, event: AppEvent) {
        // Receiver gone means the application is shutting down
        let _ = self.event_sender.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_heart_rate(&mut self, measurement: &HeartRateMeasurement) {
        self.send(AppEvent::HeartRate(measurement.clone()));
    }

    fn on_battery_level(&mut self, percent: u8) {
        self.send(AppEvent::BatteryLevel(percent));
    }

    fn on_body_sensor_location(&mut self, location: BodySensorLocation) {
        self.send(AppEvent::BodySensorLocation(location));
    }

    fn on_device_info(&mut self, field: DeviceInfoField, value: &str) {
        self.send(AppEvent::DeviceInfo {
            field,
            value: value.to_string(),
        });
    }

    fn on_capability_error(&mut self, error: &MonitorError) {
        let severity = if error.is_fatal() {
            MessageSeverity::Error
        } else {
            MessageSeverity::Warning
        };
        self.send(AppEvent::LogMessage(StatusMessage {
            message: error.to_string(),
            severity,
        }));
    }

    fn on_phase_changed(&mut self, phase: ConnectionPhase) {
        self.send(AppEvent::Phase(phase));
    }
}

/// Delivers every notification to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn on_heart_rate(&mut self, measurement: &HeartRateMeasurement) {
        self.sinks.iter_mut().for_each(|s| s.on_heart_rate(measurement));
    }

    fn on_battery_level(&mut self, percent: u8) {
        self.sinks.iter_mut().for_each(|s| s.on_battery_level(percent));
    }

    fn on_body_sensor_location(&mut self, location: BodySensorLocation) {
        self.sinks
            .iter_mut()
            .for_each(|s| s.on_body_sensor_location(location));
    }

    fn on_device_info(&mut self, field: DeviceInfoField, value: &str) {
        self.sinks
            .iter_mut()
            .for_each(|s| s.on_device_info(field, value));
    }

    fn on_capability_error(&mut self, error: &MonitorError) {
        self.sinks
            .iter_mut()
            .for_each(|s| s.on_capability_error(error));
    }

    fn on_phase_changed(&mut self, phase: ConnectionPhase) {
        self.sinks.iter_mut().for_each(|s| s.on_phase_changed(phase));
    }
}

/// Application presentation mode. Only the foreground carries a view.
#[derive(Debug)]
pub enum Mode<V> {
    Background,
    Foreground(V),
}

/// Sink that always feeds a recorder and, while in the foreground, a view.
pub struct ModalSink<R, V> {
    recorder: R,
    mode: Mode<V>,
}

impl<R: EventSink, V: EventSink> ModalSink<R, V> {
    pub fn background(recorder: R) -> Self {
        Self {
            recorder,
            mode: Mode::Background,
        }
    }

    pub fn foreground(recorder: R, view: V) -> Self {
        Self {
            recorder,
            mode: Mode::Foreground(view),
        }
    }

    pub fn is_foreground(&self) -> bool {
        matches!(self.mode, Mode::Foreground(_))
    }

    /// Attach a view, returning the one it replaces.
    pub fn enter_foreground(&mut self, view: V) -> Option<V> {
        match std::mem::replace(&mut self.mode, Mode::Foreground(view)) {
            Mode::Foreground(previous) => Some(previous),
            Mode::Background => None,
        }
    }

    /// Detach the view, if any.
    pub fn enter_background(&mut self) -> Option<V> {
        match std::mem::replace(&mut self.mode, Mode::Background) {
            Mode::Foreground(view) => Some(view),
            Mode::Background => None,
        }
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn into_parts(self) -> (R, Option<V>) {
        match self.mode {
            Mode::Foreground(view) => (self.recorder, Some(view)),
            Mode::Background => (self.recorder, None),
        }
    }
}

impl<R: EventSink, V: EventSink> EventSink for ModalSink<R, V> {
    fn on_heart_rate(&mut self, measurement: &HeartRateMeasurement) {
        self.recorder.on_heart_rate(measurement);
        if let Mode::Foreground(view) = &mut self.mode {
            view.on_heart_rate(measurement);
        }
    }

    fn on_battery_level(&mut self, percent: u8) {
        self.recorder.on_battery_level(percent);
        if let Mode::Foreground(view) = &mut self.mode {
            view.on_battery_level(percent);
        }
    }

    fn on_body_sensor_location(&mut self, location: BodySensorLocation) {
        self.recorder.on_body_sensor_location(location);
        if let Mode::Foreground(view) = &mut self.mode {
            view.on_body_sensor_location(location);
        }
    }

    fn on_device_info(&mut self, field: DeviceInfoField, value: &str) {
        self.recorder.on_device_info(field, value);
        if let Mode::Foreground(view) = &mut self.mode {
            view.on_device_info(field, value);
        }
    }

    fn on_capability_error(&mut self, error: &MonitorError) {
        self.recorder.on_capability_error(error);
        if let Mode::Foreground(view) = &mut self.mode {
            view.on_capability_error(error);
        }
    }

    fn on_phase_changed(&mut self, phase: ConnectionPhase) {
        self.recorder.on_phase_changed(phase);
        if let Mode::Foreground(view) = &mut self.mode {
            view.on_phase_changed(phase);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::recording::{Recorded, RecordingSink};
    use super::*;
    use crate::error::{CapabilityError, DecodeError};

    /// Only cares about heart rate; everything else falls through to the defaults.
    struct HeartRateOnly(Vec<u16>);

    impl EventSink for HeartRateOnly {
        fn on_heart_rate(&mut self, measurement: &HeartRateMeasurement) {
            self.0.push(measurement.bpm);
        }
    }

    #[test]
    fn test_partial_sink_uses_defaults() {
        let mut sink = HeartRateOnly(Vec::new());
        dispatch(&mut sink, &DecodedEvent::BatteryLevel(90));
        dispatch(
            &mut sink,
            &DecodedEvent::HeartRate(HeartRateMeasurement::new(72, None)),
        );
        sink.on_capability_error(&CapabilityError::Unsupported.into());
        assert_eq!(sink.0, vec![72]);
    }

    #[test]
    fn test_dispatch_routes_each_event() {
        let recorder = RecordingSink::new();
        let mut sink = recorder.clone();
        dispatch(&mut sink, &DecodedEvent::BatteryLevel(55));
        dispatch(
            &mut sink,
            &DecodedEvent::BodySensorLocation(BodySensorLocation::Wrist),
        );
        dispatch(
            &mut sink,
            &DecodedEvent::DeviceInfo {
                field: DeviceInfoField::ModelNumber,
                value: "H10".to_string(),
            },
        );
        assert_eq!(
            recorder.events(),
            vec![
                Recorded::Battery(55),
                Recorded::Location(BodySensorLocation::Wrist),
                Recorded::DeviceInfo(DeviceInfoField::ModelNumber, "H10".to_string()),
            ]
        );
    }

    #[test]
    fn test_channel_sink_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);

        sink.on_battery_level(80);
        sink.on_capability_error(&CapabilityError::Unauthorized.into());
        sink.on_capability_error(
            &DecodeError::UnsupportedCharacteristic("2A99".to_string()).into(),
        );

        assert!(matches!(rx.try_recv(), Ok(AppEvent::BatteryLevel(80))));
        match rx.try_recv() {
            Ok(AppEvent::LogMessage(msg)) => assert_eq!(msg.severity, MessageSeverity::Error),
            other => panic!("unexpected: {:?}", other),
        }
        match rx.try_recv() {
            Ok(AppEvent::LogMessage(msg)) => {
                assert_eq!(msg.severity, MessageSeverity::Warning)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        sink.on_battery_level(10);
    }

    #[test]
    fn test_fanout_delivers_to_all() {
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        let mut fanout = FanoutSink::new().with(a.clone()).with(NoopSink).with(b.clone());
        assert_eq!(fanout.len(), 3);

        fanout.on_heart_rate(&HeartRateMeasurement::new(64, Some(3)));
        let expected = vec![Recorded::HeartRate(HeartRateMeasurement::new(64, Some(3)))];
        assert_eq!(a.events(), expected);
        assert_eq!(b.events(), expected);
    }

    #[test]
    fn test_modal_sink_switches_view() {
        let recorder = RecordingSink::new();
        let view = RecordingSink::new();
        let mut sink = ModalSink::background(recorder.clone());
        assert!(!sink.is_foreground());

        sink.on_battery_level(40);
        assert!(sink.enter_foreground(view.clone()).is_none());
        assert!(sink.is_foreground());
        sink.on_battery_level(39);
        assert!(sink.enter_background().is_some());
        sink.on_battery_level(38);

        assert_eq!(
            recorder.events(),
            vec![
                Recorded::Battery(40),
                Recorded::Battery(39),
                Recorded::Battery(38)
            ]
        );
        assert_eq!(view.events(), vec![Recorded::Battery(39)]);

        let (_, detached) = sink.into_parts();
        assert!(detached.is_none());
    }
}
