//! `coiltrack-geometry` – rigid-body pose math.
//!
//! Pure quaternion and vector arithmetic for the hotspot pipeline: averaging
//! tracked poses during calibration and rotating the frozen calibration
//! offset through live marker attitudes. Everything here is `f64`,
//! side-effect free, and independent of the transport layer.
//!
//! # Modules
//!
//! - [`pose`] – [`Vec3`][pose::Vec3], [`Quat`][pose::Quat] and
//!   [`Pose`][pose::Pose]: scalar-first quaternions with explicit
//!   normalization failure, Hamilton products, and vector rotation via the
//!   pure-quaternion sandwich.

pub mod pose;

pub use pose::{Pose, Quat, Vec3};
