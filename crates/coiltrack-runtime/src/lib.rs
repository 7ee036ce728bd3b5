//! `coiltrack-runtime` – Dispatch orchestration.
//!
//! Wires the transport to the core: one task pulls events off the bus lanes,
//! drives the calibration session, projects calibrated marker frames onto
//! the hotspot, and publishes results and diagnostics back.
//!
//! # Modules
//!
//! - [`locator`] – [`LocatorLoop`][locator::LocatorLoop]: the single
//!   event-at-a-time dispatch loop with prompt control servicing
//!   (ping/pong, begin, recalibrate, shutdown).

pub mod locator;

pub use locator::{LocatorConfig, LocatorLoop};
