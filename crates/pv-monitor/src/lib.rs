//! Peerview telemetry aggregation
//!
//! Telemetry piggybacks on the peerview transport: each reporting cycle
//! wraps a serialized pong message in a `PeerviewMonitorEntry`, tags it
//! with a (context, sub-context) pair as a `MonitorEntry`, batches entries
//! into a `MonitorMessage`, and hands the batch to the `MonitorService`
//! for broadcast and listener dispatch.

pub mod entry;
pub mod error;
pub mod message;
pub mod peerview_entry;
pub mod service;

pub use entry::MonitorEntry;
pub use error::MonitorError;
pub use message::{MonitorCommand, MonitorMessage, MonitorMessageType};
pub use peerview_entry::{PeerviewMonitorEntry, RdvConfig};
pub use service::{ListenerId, MonitorListener, MonitorService, MonitorSink};
