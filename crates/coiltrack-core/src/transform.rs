//! Hotspot projection.
//!
//! Once a [`CalibrationVector`] is frozen, every live marker pose maps onto
//! the hotspot with three quaternion operations: normalize the marker
//! attitude, express it relative to the calibration reference, and rotate
//! the frozen offset through that relative attitude. The rotated offset and
//! the live marker position give the hotspot; the rotated offset alone is
//! the heading.
//!
//! Non-finite arithmetic never stops the stream. A marker that leaves the
//! capture volume produces NaN components; the projection is flagged
//! degraded and emitted anyway so downstream consumers can decide.
//!
//! # Example
//!
//! ```rust
//! use coiltrack_core::calibration::CalibrationVector;
//! use coiltrack_core::transform::HotspotProjector;
//! use coiltrack_geometry::{Pose, Quat, Vec3};
//!
//! let projector = HotspotProjector::new(CalibrationVector {
//!     offset: Vec3::new(1.0, 0.0, 0.0),
//!     reference_orientation: Quat::identity(),
//! });
//!
//! let marker = Pose::new(Vec3::new(2.0, 0.0, 0.0), Quat::identity());
//! let hotspot = projector.project(&marker);
//! assert!((hotspot.position.x - 3.0).abs() < 1e-12);
//! assert!(!hotspot.degraded);
//! ```

use coiltrack_geometry::{Pose, Quat, Vec3};

use crate::calibration::CalibrationVector;

/// One projected hotspot pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub position: Vec3,
    /// The rotated calibration offset: marker → hotspot in the current
    /// marker attitude.
    pub heading: Vec3,
    /// Set when any output component is non-finite.
    pub degraded: bool,
}

/// Stateless per-call projector over a frozen [`CalibrationVector`].
#[derive(Debug, Clone, Copy)]
pub struct HotspotProjector {
    calibration: CalibrationVector,
}

impl HotspotProjector {
    pub fn new(calibration: CalibrationVector) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &CalibrationVector {
        &self.calibration
    }

    /// Project one marker pose onto the hotspot. Identical inputs produce
    /// identical outputs; no history is kept between calls.
    pub fn project(&self, marker: &Pose) -> Projection {
        let Some(qk) = marker.orientation.normalized() else {
            // Unusable attitude: emit the propagating-NaN result.
            return Projection {
                position: Vec3::nan(),
                heading: Vec3::nan(),
                degraded: true,
            };
        };
        let relative = qk.mul(self.calibration.reference_orientation.conjugate());
        let arm = relative.rotate(self.calibration.offset);
        let position = arm.add(marker.position);
        let degraded = !(position.is_finite() && arm.is_finite());
        Projection {
            position,
            heading: arm,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn unit_offset_projector() -> HotspotProjector {
        HotspotProjector::new(CalibrationVector {
            offset: Vec3::new(1.0, 0.0, 0.0),
            reference_orientation: Quat::identity(),
        })
    }

    #[test]
    fn marker_translation_carries_the_hotspot() {
        let projector = unit_offset_projector();
        let marker = Pose::new(Vec3::new(2.0, 0.0, 0.0), Quat::identity());
        let p = projector.project(&marker);
        assert!((p.position.x - 3.0).abs() < 1e-12);
        assert!(p.position.y.abs() < 1e-12);
        assert!(p.position.z.abs() < 1e-12);
        assert!((p.heading.x - 1.0).abs() < 1e-12);
        assert!(!p.degraded);
    }

    #[test]
    fn marker_yaw_swings_the_offset() {
        // 90° around Z relative to the identity reference: the +X offset
        // swings to +Y.
        let projector = unit_offset_projector();
        let q90z = Quat::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let marker = Pose::new(Vec3::zero(), q90z);
        let p = projector.project(&marker);
        assert!(p.position.x.abs() < 1e-9, "x={}", p.position.x);
        assert!((p.position.y - 1.0).abs() < 1e-9, "y={}", p.position.y);
        assert!(p.position.z.abs() < 1e-9);
    }

    #[test]
    fn attitude_matching_the_reference_cancels_out() {
        // Live attitude equal to the calibration reference leaves the offset
        // unrotated, wherever that reference points.
        let q90z = Quat::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let projector = HotspotProjector::new(CalibrationVector {
            offset: Vec3::new(1.0, 0.0, 0.0),
            reference_orientation: q90z,
        });
        let marker = Pose::new(Vec3::new(0.0, 5.0, 0.0), q90z);
        let p = projector.project(&marker);
        assert!((p.position.x - 1.0).abs() < 1e-9);
        assert!((p.position.y - 5.0).abs() < 1e-9);
        assert!(!p.degraded);
    }

    #[test]
    fn projection_is_idempotent() {
        let projector = unit_offset_projector();
        let marker = Pose::from_wire([3.0, -1.0, 2.0], [0.1, -0.2, 0.3, 0.9]);
        let first = projector.project(&marker);
        let second = projector.project(&marker);
        assert_eq!(first, second);
    }

    #[test]
    fn unnormalizable_attitude_degrades_but_still_emits() {
        let projector = unit_offset_projector();
        let marker = Pose::from_wire([1.0, 1.0, 1.0], [0.0, 0.0, 0.0, 0.0]);
        let p = projector.project(&marker);
        assert!(p.degraded);
        assert!(p.position.x.is_nan());
        assert!(p.heading.x.is_nan());
    }

    #[test]
    fn nan_position_degrades_but_keeps_the_heading() {
        let projector = unit_offset_projector();
        let marker = Pose::from_wire([f64::NAN, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]);
        let p = projector.project(&marker);
        assert!(p.degraded);
        assert!(p.position.x.is_nan());
        // The attitude was fine, so the heading still is.
        assert!((p.heading.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unnormalized_attitude_is_scaled_not_rejected() {
        // Double-length quaternion encodes the same rotation.
        let projector = unit_offset_projector();
        let marker = Pose::new(Vec3::zero(), Quat::new(2.0, 0.0, 0.0, 0.0));
        let p = projector.project(&marker);
        assert!((p.position.x - 1.0).abs() < 1e-12);
        assert!(!p.degraded);
    }
}
