//! `coiltrack-core` – Calibration & Projection
//!
//! The decision-making heart of the locator. It holds no transport code; it
//! takes poses in and hands calibration vectors and hotspot projections back.
//!
//! # Modules
//!
//! - [`buffer`] – [`SampleBuffer`][buffer::SampleBuffer]:
//!   fixed-capacity pose storage for one tool during a collection pass, with
//!   explicit capacity and fullness queries instead of bare fill counters.
//! - [`calibration`] – [`CalibrationSession`][calibration::CalibrationSession]:
//!   the phase machine that discovers the sampling frequency, collects plate
//!   and marker poses, and freezes the averaged
//!   [`CalibrationVector`][calibration::CalibrationVector].
//! - [`transform`] – [`HotspotProjector`][transform::HotspotProjector]:
//!   projects each live marker pose onto the hotspot using the frozen
//!   calibration vector, flagging non-finite results as degraded instead of
//!   failing.

pub mod buffer;
pub mod calibration;
pub mod transform;

pub use buffer::SampleBuffer;
pub use calibration::{CalibrationPhase, CalibrationSession, CalibrationVector, SessionConfig};
pub use transform::{HotspotProjector, Projection};
