//! Calibration phase machine.
//!
//! A session walks one lifecycle: discover the sampling frequency from the
//! first usable frame period, size the two pose buffers, wait for the begin
//! command (optionally settling through an observable countdown), collect
//! plate and marker poses, then freeze the averaged [`CalibrationVector`].
//! A bad sample aborts the attempt and rearms the session; a frozen vector
//! is only ever discarded by the explicit recalibrate command.
//!
//! # Example
//!
//! ```rust
//! use coiltrack_core::calibration::{CalibrationPhase, CalibrationSession, SessionConfig};
//! use coiltrack_geometry::{Pose, Quat, Vec3};
//! use coiltrack_types::ToolRole;
//!
//! let mut session = CalibrationSession::new(SessionConfig {
//!     duration_secs: 0.1,
//!     start_delay_secs: 0.0,
//! });
//!
//! // The first usable frame period sizes the buffers: 0.1 s at 20 Hz → 2 poses.
//! session.observe_rate(0.05);
//! assert_eq!(session.phase(), CalibrationPhase::AwaitingStart);
//! session.begin();
//!
//! let plate = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::identity());
//! let marker = Pose::new(Vec3::zero(), Quat::identity());
//! session.ingest(ToolRole::Plate, plate, 0.05).unwrap();
//! session.ingest(ToolRole::Plate, plate, 0.05).unwrap();
//! session.ingest(ToolRole::Marker, marker, 0.05).unwrap();
//!
//! // The sample completing the later buffer freezes the vector.
//! let summary = session.ingest(ToolRole::Marker, marker, 0.05).unwrap().unwrap();
//! assert!((summary.offset[0] - 1.0).abs() < 1e-12);
//! assert_eq!(session.phase(), CalibrationPhase::Calibrated);
//! ```

use coiltrack_geometry::{Pose, Quat, Vec3};
use coiltrack_types::{CalibrationSummary, ToolRole, TrackError};
use tracing::{debug, error, info, warn};

use crate::buffer::SampleBuffer;

/// Tunables for one calibration session.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Seconds of samples each buffer holds once the sampling rate is known.
    pub duration_secs: f64,
    /// Settle delay between the begin command and collection, counted down
    /// in marker frames. Zero skips the countdown entirely.
    pub start_delay_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            start_delay_secs: 0.0,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    /// Sampling frequency not yet known; buffers not yet sized.
    Idle,
    /// Buffers sized; frames are observed but not stored until begun.
    AwaitingStart,
    /// Begin received with a settle delay; `remaining` marker frames to go.
    PendingStart { remaining: usize },
    Collecting,
    Calibrated,
}

impl CalibrationPhase {
    /// Uppercase name for logs and phase-change events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::AwaitingStart => "AWAITING_START",
            Self::PendingStart { .. } => "PENDING_START",
            Self::Collecting => "COLLECTING",
            Self::Calibrated => "CALIBRATED",
        }
    }
}

/// The frozen output of a successful collection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationVector {
    /// Xi: mean plate position minus mean marker position, expressed in the
    /// reference marker attitude.
    pub offset: Vec3,
    /// Qi: normalized mean marker orientation over the pass.
    pub reference_orientation: Quat,
}

/// Owns the two sample buffers and drives the calibration lifecycle.
///
/// The session never touches the transport: callers feed it poses and frame
/// periods and forward whatever it returns.
#[derive(Debug)]
pub struct CalibrationSession {
    config: SessionConfig,
    phase: CalibrationPhase,
    sample_rate: Option<f64>,
    settle_ticks: usize,
    plate: SampleBuffer,
    marker: SampleBuffer,
    calibration: Option<CalibrationVector>,
}

impl CalibrationSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            phase: CalibrationPhase::Idle,
            sample_rate: None,
            settle_ticks: 0,
            plate: SampleBuffer::with_capacity(0),
            marker: SampleBuffer::with_capacity(0),
            calibration: None,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Frames per second, once discovered.
    pub fn sample_rate(&self) -> Option<f64> {
        self.sample_rate
    }

    pub fn calibration(&self) -> Option<&CalibrationVector> {
        self.calibration.as_ref()
    }

    pub fn buffer_fill(&self, role: ToolRole) -> usize {
        self.buffer(role).len()
    }

    pub fn buffer_capacity(&self, role: ToolRole) -> usize {
        self.buffer(role).capacity()
    }

    /// Feed one frame period while the rate is unknown. Zero and non-finite
    /// periods are ignored and the session keeps waiting; the first usable
    /// one fixes the rate for the whole session and sizes both buffers.
    /// Returns `true` when this observation established the rate.
    pub fn observe_rate(&mut self, delta_time: f64) -> bool {
        if self.phase != CalibrationPhase::Idle {
            return false;
        }
        if !delta_time.is_finite() || delta_time <= 0.0 {
            debug!(delta_time, "frame period unusable, still waiting for the sampling rate");
            return false;
        }
        let rate = 1.0 / delta_time;
        let capacity = ((self.config.duration_secs * rate).round() as usize).max(1);
        self.sample_rate = Some(rate);
        self.settle_ticks = (self.config.start_delay_secs * rate).round() as usize;
        self.plate = SampleBuffer::with_capacity(capacity);
        self.marker = SampleBuffer::with_capacity(capacity);
        self.phase = CalibrationPhase::AwaitingStart;
        info!(rate_hz = rate, capacity, "sampling frequency established");
        true
    }

    /// Arm collection. Valid from `AwaitingStart`; with a configured settle
    /// delay the session passes through `PendingStart` first. Anywhere else
    /// the command is ignored. Returns the phase after the call.
    pub fn begin(&mut self) -> CalibrationPhase {
        match self.phase {
            CalibrationPhase::AwaitingStart => {
                if self.settle_ticks > 0 {
                    self.phase = CalibrationPhase::PendingStart {
                        remaining: self.settle_ticks,
                    };
                    info!(marker_frames = self.settle_ticks, "collection armed, settling");
                } else {
                    self.phase = CalibrationPhase::Collecting;
                    info!("collection started");
                }
            }
            CalibrationPhase::Idle => {
                warn!("begin ignored, sampling frequency not yet established");
            }
            _ => warn!(phase = self.phase.name(), "begin ignored"),
        }
        self.phase
    }

    /// Discard the frozen vector and rearm. Valid only from `Calibrated`;
    /// ignored elsewhere. Returns the phase after the call.
    pub fn recalibrate(&mut self) -> CalibrationPhase {
        match self.phase {
            CalibrationPhase::Calibrated => {
                self.plate.clear();
                self.marker.clear();
                self.calibration = None;
                self.phase = CalibrationPhase::AwaitingStart;
                info!("calibration vector discarded, session rearmed");
            }
            _ => warn!(phase = self.phase.name(), "recalibrate ignored outside CALIBRATED"),
        }
        self.phase
    }

    /// Route one role-tagged pose through the current phase.
    ///
    /// - `Idle`: the frame period drives rate discovery, the pose is not kept.
    /// - `AwaitingStart` / `Calibrated`: observed, nothing stored.
    /// - `PendingStart`: marker frames tick the countdown; the frame reaching
    ///   zero is consumed by it, collection starts with the next one.
    /// - `Collecting`: the pose is validated and appended to its role buffer;
    ///   when both buffers are full the vector is frozen and the summary
    ///   returned, exactly once per pass.
    ///
    /// # Errors
    ///
    /// [`TrackError::InvalidSample`] when a collected pose has non-finite
    /// components, a zero-norm orientation, or the finished pass averages to
    /// a degenerate orientation. The attempt is aborted: both buffers clear
    /// and the phase returns to `AwaitingStart` so the operator can retry.
    pub fn ingest(
        &mut self,
        role: ToolRole,
        pose: Pose,
        delta_time: f64,
    ) -> Result<Option<CalibrationSummary>, TrackError> {
        match self.phase {
            CalibrationPhase::Idle => {
                self.observe_rate(delta_time);
                Ok(None)
            }
            CalibrationPhase::AwaitingStart | CalibrationPhase::Calibrated => Ok(None),
            CalibrationPhase::PendingStart { remaining } => {
                if role == ToolRole::Marker {
                    let remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        self.phase = CalibrationPhase::Collecting;
                        info!("settle countdown elapsed, collection started");
                    } else {
                        self.phase = CalibrationPhase::PendingStart { remaining };
                    }
                }
                Ok(None)
            }
            CalibrationPhase::Collecting => self.collect(role, pose),
        }
    }

    fn buffer(&self, role: ToolRole) -> &SampleBuffer {
        match role {
            ToolRole::Plate => &self.plate,
            ToolRole::Marker => &self.marker,
        }
    }

    fn collect(&mut self, role: ToolRole, pose: Pose) -> Result<Option<CalibrationSummary>, TrackError> {
        if let Err(err) = validate_pose(role, &pose) {
            self.abort(&err);
            return Err(err);
        }

        let buffer = match role {
            ToolRole::Plate => &mut self.plate,
            ToolRole::Marker => &mut self.marker,
        };
        if !buffer.push(pose) {
            debug!(role = ?role, "buffer already full, sample dropped");
        }

        if self.plate.is_full() && self.marker.is_full() {
            match self.freeze() {
                Ok(summary) => return Ok(Some(summary)),
                Err(err) => {
                    self.abort(&err);
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Average both buffers and freeze the calibration vector.
    fn freeze(&mut self) -> Result<CalibrationSummary, TrackError> {
        let orientation_mean = |buffer: &SampleBuffer, role: ToolRole| -> Result<Quat, TrackError> {
            let orientations: Vec<Quat> = buffer.poses().iter().map(|p| p.orientation).collect();
            Quat::component_mean(&orientations)
                .and_then(Quat::normalized)
                .ok_or_else(|| TrackError::InvalidSample {
                    role,
                    details: "orientation mean cannot be normalized".to_string(),
                })
        };
        let position_mean = |buffer: &SampleBuffer, role: ToolRole| -> Result<Vec3, TrackError> {
            let positions: Vec<Vec3> = buffer.poses().iter().map(|p| p.position).collect();
            Vec3::mean(&positions).ok_or_else(|| TrackError::InvalidSample {
                role,
                details: "no samples collected".to_string(),
            })
        };

        let qi = orientation_mean(&self.marker, ToolRole::Marker)?;
        let plate_orientation = orientation_mean(&self.plate, ToolRole::Plate)?;
        let ni = position_mean(&self.plate, ToolRole::Plate)?;
        let ti = position_mean(&self.marker, ToolRole::Marker)?;
        let xi = ni.sub(ti);

        self.calibration = Some(CalibrationVector {
            offset: xi,
            reference_orientation: qi,
        });
        self.phase = CalibrationPhase::Calibrated;
        info!(
            offset_x = xi.x,
            offset_y = xi.y,
            offset_z = xi.z,
            "calibration vector frozen"
        );

        Ok(CalibrationSummary {
            plate_orientation: plate_orientation.to_scalar_first(),
            plate_position: ni.to_array(),
            marker_orientation: qi.to_scalar_first(),
            marker_position: ti.to_array(),
            offset: xi.to_array(),
        })
    }

    fn abort(&mut self, err: &TrackError) {
        error!(error = %err, "calibration attempt aborted");
        self.plate.clear();
        self.marker.clear();
        self.phase = CalibrationPhase::AwaitingStart;
    }
}

fn validate_pose(role: ToolRole, pose: &Pose) -> Result<(), TrackError> {
    if !pose.is_finite() {
        return Err(TrackError::InvalidSample {
            role,
            details: "non-finite position or orientation component".to_string(),
        });
    }
    if pose.orientation.norm() == 0.0 {
        return Err(TrackError::InvalidSample {
            role,
            details: "zero-norm orientation".to_string(),
        });
    }
    Ok(())
}
