//! [`LocatorLoop`] – the dispatch loop.
//!
//! One task owns the whole pipeline state and pulls one event at a time from
//! its two bus subscriptions:
//!
//! 1. **Control** – ping keep-alives are answered immediately with the
//!    module's identification string, whatever the calibration state;
//!    begin/recalibrate commands drive the session; shutdown is acknowledged
//!    and ends the loop after the in-flight event.
//! 2. **Tracker frames** – frames tagged with the configured trigger are
//!    routed by phase: rate discovery while idle, buffer collection while
//!    calibrating, hotspot projection once calibrated. Everything else on
//!    the lane is ignored.
//!
//! The `select!` is biased toward the control lane so keep-alives stay
//! serviced even under a frame flood. There is no shared state and no
//! locking: the session, the buffers and the projector live inside the loop,
//! and each event is fully processed before the next one is pulled.

use coiltrack_core::{CalibrationPhase, CalibrationSession, HotspotProjector, SessionConfig};
use coiltrack_geometry::Pose;
use coiltrack_middleware::{EventBus, Topic, TopicReceiver};
use coiltrack_types::{
    CalibrationSummary, Event, EventPayload, FrameTrigger, HotspotReport, PoseSample, ToolRole,
    ToolRoles, TrackError,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Source tag stamped on every event this loop publishes.
const SOURCE: &str = "coiltrack-runtime::locator";

/// Configuration bundle for [`LocatorLoop`].
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Identification string for ping replies and shutdown acks.
    pub module_name: String,
    /// Wire identities of the plate and marker tools.
    pub roles: ToolRoles,
    /// The inbound frame source this locator follows.
    pub trigger: FrameTrigger,
    pub session: SessionConfig,
}

/// The dispatch loop. Construct it, then [`run`][LocatorLoop::run] it to
/// completion on its own task.
pub struct LocatorLoop {
    bus: EventBus,
    control_rx: TopicReceiver,
    frames_rx: TopicReceiver,
    module_name: String,
    roles: ToolRoles,
    trigger: FrameTrigger,
    session: CalibrationSession,
    projector: Option<HotspotProjector>,
}

impl LocatorLoop {
    /// Subscribe to the bus lanes and assemble the loop. Events published
    /// after this call are buffered for the loop even before it runs.
    pub fn new(bus: EventBus, config: LocatorConfig) -> Self {
        let control_rx = bus.subscribe_to(Topic::Control);
        let frames_rx = bus.subscribe_to(Topic::TrackerFrames);
        Self {
            bus,
            control_rx,
            frames_rx,
            module_name: config.module_name,
            roles: config.roles,
            trigger: config.trigger,
            session: CalibrationSession::new(config.session),
            projector: None,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.session.phase()
    }

    pub fn is_calibrated(&self) -> bool {
        self.projector.is_some()
    }

    /// Run until a shutdown command arrives or the bus closes.
    ///
    /// # Errors
    ///
    /// [`TrackError::Transport`] when a bus lane closes underneath the loop.
    /// Lagged subscriptions are logged and survived.
    pub async fn run(&mut self) -> Result<(), TrackError> {
        info!(
            module = %self.module_name,
            trigger = self.trigger.name(),
            "locator loop running"
        );
        loop {
            tokio::select! {
                biased;

                control = self.control_rx.recv() => match control {
                    Ok(event) => {
                        if self.handle_control(&event) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "control subscriber lagged");
                    }
                    Err(RecvError::Closed) => {
                        return Err(TrackError::Transport("control lane closed".to_string()));
                    }
                },

                frame = self.frames_rx.recv() => match frame {
                    Ok(event) => self.handle_frame(&event),
                    Err(RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "frame subscriber lagged, samples dropped");
                    }
                    Err(RecvError::Closed) => {
                        return Err(TrackError::Transport("tracker frame lane closed".to_string()));
                    }
                },
            }
        }
        info!(module = %self.module_name, "locator loop disconnected");
        Ok(())
    }

    /// Service one control event. Returns `true` on shutdown.
    fn handle_control(&mut self, event: &Event) -> bool {
        match &event.payload {
            EventPayload::Ping => {
                debug!(from = %event.source, "ping");
                self.publish(
                    Topic::Control,
                    EventPayload::Pong {
                        module: self.module_name.clone(),
                    },
                );
            }
            EventPayload::BeginCalibration => {
                let before = self.session.phase();
                let after = self.session.begin();
                self.publish_phase_change(before, after);
            }
            EventPayload::Recalibrate => {
                let before = self.session.phase();
                let after = self.session.recalibrate();
                if after != before {
                    self.projector = None;
                }
                self.publish_phase_change(before, after);
            }
            EventPayload::Shutdown => {
                info!("shutdown requested, acknowledging and disconnecting");
                self.publish(
                    Topic::Control,
                    EventPayload::ShutdownAck {
                        module: self.module_name.clone(),
                    },
                );
                return true;
            }
            // Own pongs and acks echo back on this lane; ignore them.
            _ => {}
        }
        false
    }

    fn handle_frame(&mut self, event: &Event) {
        let EventPayload::TrackerFrame { trigger, sample } = &event.payload else {
            debug!(source = %event.source, "non-frame payload on the frame lane, ignoring");
            return;
        };
        if *trigger != self.trigger {
            // A source this locator is not configured to follow.
            return;
        }
        match self.projector {
            Some(projector) => self.project_frame(&projector, sample),
            None => self.calibrate_frame(sample),
        }
    }

    /// Route one frame through the calibration session.
    fn calibrate_frame(&mut self, sample: &PoseSample) {
        let Some(role) = self.roles.role_of(sample.tool_id) else {
            debug!(tool_id = sample.tool_id, "frame from an untracked tool, ignoring");
            return;
        };
        let pose = Pose::from_wire(sample.position, sample.orientation);
        let before = self.session.phase();
        match self.session.ingest(role, pose, sample.delta_time) {
            Ok(Some(summary)) => {
                self.log_summary(&summary);
                if let Some(vector) = self.session.calibration().copied() {
                    self.projector = Some(HotspotProjector::new(vector));
                }
                self.publish(Topic::Diagnostics, EventPayload::CalibrationComplete(summary));
            }
            Ok(None) => {}
            Err(err) => {
                self.publish(
                    Topic::Diagnostics,
                    EventPayload::CalibrationAborted {
                        reason: err.to_string(),
                    },
                );
            }
        }
        let after = self.session.phase();
        self.publish_phase_change(before, after);
    }

    /// Project one calibrated frame. Only marker frames are projected; the
    /// plate has done its job.
    fn project_frame(&self, projector: &HotspotProjector, sample: &PoseSample) {
        if self.roles.role_of(sample.tool_id) != Some(ToolRole::Marker) {
            return;
        }
        let pose = Pose::from_wire(sample.position, sample.orientation);
        let projection = projector.project(&pose);
        if projection.degraded {
            warn!(sequence = sample.sequence, "degraded tracking, non-finite projection");
            self.publish(
                Topic::Diagnostics,
                EventPayload::DegradedTracking {
                    sequence: sample.sequence,
                },
            );
        }
        let report = HotspotReport {
            position: projection.position.to_array(),
            heading: projection.heading.to_array(),
            degraded: projection.degraded,
            sequence: sample.sequence,
            delta_time: sample.delta_time,
        };
        self.publish(Topic::HotspotReports, EventPayload::Hotspot(report));
    }

    /// Publish a phase-change notice when the phase name moved (countdown
    /// ticks within `PENDING_START` stay quiet).
    fn publish_phase_change(&self, before: CalibrationPhase, after: CalibrationPhase) {
        if before.name() == after.name() {
            return;
        }
        info!(phase = after.name(), "phase changed");
        self.publish(
            Topic::Diagnostics,
            EventPayload::PhaseChanged {
                phase: after.name().to_string(),
            },
        );
    }

    fn log_summary(&self, summary: &CalibrationSummary) {
        let quad = |q: [f64; 4]| format!("{:.5e}, {:.5e}, {:.5e}, {:.5e}", q[0], q[1], q[2], q[3]);
        let triple = |v: [f64; 3]| format!("{:.5e}, {:.5e}, {:.5e}", v[0], v[1], v[2]);
        info!("calibration complete");
        info!("plate orientation:  {}", quad(summary.plate_orientation));
        info!("plate position:     {}", triple(summary.plate_position));
        info!("marker orientation: {}", quad(summary.marker_orientation));
        info!("marker position:    {}", triple(summary.marker_position));
        info!("hotspot offset:     {}", triple(summary.offset));
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        // Best-effort publish – no subscribers is not an error.
        let _ = self.bus.publish_to(topic, Event::new(SOURCE, payload));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
