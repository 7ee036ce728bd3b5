//! Fixed-capacity pose storage for one tracked tool.

use coiltrack_geometry::Pose;

/// Append-only pose storage with a hard capacity.
///
/// Collection for a tool is finished exactly when [`SampleBuffer::is_full`];
/// pushes after that are dropped, never overwritten. The buffer is cleared
/// only when a collection attempt is aborted or a recalibration starts.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    poses: Vec<Pose>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            poses: Vec::with_capacity(capacity),
        }
    }

    /// Append a pose. Returns `false` when the buffer was already full and
    /// the pose was dropped.
    pub fn push(&mut self, pose: Pose) -> bool {
        if self.is_full() {
            return false;
        }
        self.poses.push(pose);
        true
    }

    pub fn is_full(&self) -> bool {
        self.poses.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }

    /// Everything collected so far, in arrival order.
    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiltrack_geometry::{Quat, Vec3};

    fn pose(x: f64) -> Pose {
        Pose::new(Vec3::new(x, 0.0, 0.0), Quat::identity())
    }

    #[test]
    fn fills_to_capacity_and_no_further() {
        let mut buf = SampleBuffer::with_capacity(3);
        assert!(buf.push(pose(1.0)));
        assert!(buf.push(pose(2.0)));
        assert!(!buf.is_full());
        assert!(buf.push(pose(3.0)));
        assert!(buf.is_full());

        // Fourth pose is dropped; length never exceeds capacity.
        assert!(!buf.push(pose(4.0)));
        assert_eq!(buf.len(), 3);
        assert!((buf.poses()[2].position.x - 3.0).abs() < 1e-12);
    }

    #[test]
    fn clear_resets_fill_but_not_capacity() {
        let mut buf = SampleBuffer::with_capacity(2);
        buf.push(pose(1.0));
        buf.push(pose(2.0));
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 2);
        assert!(buf.push(pose(5.0)));
    }

    #[test]
    fn zero_capacity_buffer_is_always_full() {
        let mut buf = SampleBuffer::with_capacity(0);
        assert!(buf.is_full());
        assert!(!buf.push(pose(1.0)));
        assert!(buf.is_empty());
    }
}
