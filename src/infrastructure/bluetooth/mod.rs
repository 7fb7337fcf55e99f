//! Bluetooth Module
//!
//! BLE client for standard heart-rate straps.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     MonitorService                       │
//! │   (tokio task - commands and radio events, one by one)  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   HeartRateMonitor                       │
//! │        (connection state machine, session state)         │
//! └──────┬──────────────┬──────────────┬──────────────┬─────┘
//!        │              │              │              │
//!        ▼              ▼              ▼              ▼
//! ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │  Adapter   │ │ Discovery  │ │  Protocol  │ │   UUIDs    │
//! │            │ │            │ │            │ │            │
//! │ - requests │ │ - per-     │ │ - decode   │ │ - services │
//! │ - events   │ │   service  │ │   values   │ │ - charac-  │
//! │ - simulator│ │   plan     │ │            │ │   teristics│
//! └────────────┘ └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`uuids`] - GATT service and characteristic catalog
//! - [`protocol`] - Characteristic value decoding
//! - [`discovery`] - Which characteristics to look for, and what to do with them
//! - [`adapter`] - Platform radio contract and callback events
//! - [`monitor`] - Connection state machine
//! - [`service`] - Async driver running the monitor on a tokio task
//! - [`simulator`] - In-process heart rate strap

pub mod adapter;
pub mod discovery;
pub mod monitor;
pub mod protocol;
pub mod service;
pub mod simulator;
pub mod uuids;

pub use adapter::{RadioAdapter, RadioEvent};
pub use monitor::HeartRateMonitor;
pub use protocol::{Decoder, WordOrder};
pub use service::MonitorHandle;
pub use simulator::{SimulatedRadio, SimulatedStrap};
