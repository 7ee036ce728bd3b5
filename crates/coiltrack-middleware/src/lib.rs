//! `coiltrack-middleware` – Transport boundary.
//!
//! The locator never speaks a tracker protocol directly. It publishes to and
//! subscribes from the internal [`EventBus`][bus::EventBus]; adapters sit at
//! the edge and translate between bus events and the outside world.
//!
//! # Modules
//!
//! - [`bus`] – [`EventBus`][bus::EventBus]: topic-laned broadcast bus
//!   carrying tracker frames, hotspot reports, control commands and
//!   diagnostics on separate channels.
//! - [`adapter`] – [`TrackerAdapter`][adapter::TrackerAdapter]: the trait
//!   every external-protocol bridge implements (inbound frame stream,
//!   outbound report delivery).
//! - [`replay`] – [`ReplayAdapter`][replay::ReplayAdapter]: file-backed
//!   adapter that replays recorded pose samples, paced by their frame
//!   periods, for demos and hardware-free testing.

pub mod adapter;
pub mod bus;
pub mod replay;

pub use adapter::TrackerAdapter;
pub use bus::{EventBus, Topic, TopicReceiver};
pub use replay::ReplayAdapter;
