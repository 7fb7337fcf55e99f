//! Heart Rate Monitor
//!
//! BLE client for standard heart-rate peripherals: discovers a strap, connects,
//! resolves the Heart Rate, Battery and Device Information services, and turns
//! characteristic values into typed events delivered to an [`EventSink`].
//!
//! [`EventSink`]: domain::sink::EventSink

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{AppEvent, ConnectionPhase, HeartRateMeasurement};
pub use domain::sink::EventSink;
pub use error::MonitorError;
pub use infrastructure::bluetooth::{HeartRateMonitor, RadioAdapter, RadioEvent};
