//! Pose primitives.
//!
//! Scalar-first quaternions (`w, x, y, z`) over `f64`, the small vector
//! algebra the calibration averages need, and the [`Pose`] pair the rest of
//! the workspace passes around. Tracking hardware delivers orientations
//! scalar-last (`[x, y, z, w]`); [`Quat::from_scalar_last`] is the single
//! place that ordering is corrected.
//!
//! # Example
//!
//! ```rust
//! use coiltrack_geometry::pose::{Quat, Vec3};
//!
//! // A wire-order identity quaternion, reordered for math.
//! let q = Quat::from_scalar_last([0.0, 0.0, 0.0, 1.0]);
//! assert_eq!(q, Quat::identity());
//!
//! // Rotating a calibration offset through a marker attitude.
//! let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
//! assert!((r.x - 1.0).abs() < 1e-12);
//! ```

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector in the tracking volume frame (millimetres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// All components NaN, the propagating value for a failed projection.
    pub fn nan() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Euclidean length.
    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Arithmetic mean of a set of vectors. `None` on empty input.
    pub fn mean(vectors: &[Vec3]) -> Option<Vec3> {
        if vectors.is_empty() {
            return None;
        }
        let mut acc = Vec3::zero();
        for v in vectors {
            acc = acc.add(*v);
        }
        Some(acc.scale(1.0 / vectors.len() as f64))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quat
// ────────────────────────────────────────────────────────────────────────────

/// A quaternion in scalar-first (w, x, y, z) convention.
///
/// Rotation operations assume |q| = 1; use [`Quat::normalized`] to get there
/// and to surface degenerate inputs explicitly instead of dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quat {
    /// Create a quaternion.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Reorder a wire quaternion `[x, y, z, w]` into scalar-first form.
    pub fn from_scalar_last(q: [f64; 4]) -> Self {
        Self::new(q[3], q[0], q[1], q[2])
    }

    /// Back to wire order `[x, y, z, w]`.
    pub fn to_scalar_last(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn to_scalar_first(self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Euclidean norm over all four components.
    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.w.is_finite() && self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Scale to unit norm. `None` when the norm is zero or non-finite; the
    /// caller decides whether that means a bad sample or degraded tracking.
    /// Idempotent on unit quaternions.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if n > 0.0 && n.is_finite() {
            Some(Self::new(self.w / n, self.x / n, self.y / n, self.z / n))
        } else {
            None
        }
    }

    /// Hamilton product: `a.mul(b)` composes rotation `b` followed by `a`.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        // Express v as a pure quaternion.
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Component-wise arithmetic mean, NOT normalized. Callers normalize
    /// explicitly so a degenerate mean (near-antipodal inputs) is caught
    /// rather than silently rescaled. `None` on empty input.
    pub fn component_mean(quats: &[Quat]) -> Option<Quat> {
        if quats.is_empty() {
            return None;
        }
        let mut acc = Quat::new(0.0, 0.0, 0.0, 0.0);
        for q in quats {
            acc = Quat::new(acc.w + q.w, acc.x + q.x, acc.y + q.y, acc.z + q.z);
        }
        let inv = 1.0 / quats.len() as f64;
        Some(Quat::new(acc.w * inv, acc.x * inv, acc.y * inv, acc.z * inv))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose
// ────────────────────────────────────────────────────────────────────────────

/// A tracked rigid-body pose: position plus attitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Build a pose from wire arrays: position `[x, y, z]` and orientation
    /// in the hardware's scalar-last ordering.
    pub fn from_wire(position: [f64; 3], orientation_xyzw: [f64; 4]) -> Self {
        Self::new(
            Vec3::from_array(position),
            Quat::from_scalar_last(orientation_xyzw),
        )
    }

    /// True when every component of position and orientation is finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
