use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Which of the two tracked rigid bodies a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolRole {
    /// The fixed reference plate marking the hotspot location.
    Plate,
    /// The moving marker rigidly attached to the treatment coil.
    Marker,
}

/// Wire identities of the two role tools, resolved once at startup from the
/// ordered tool list. The tracking server numbers tools `list index + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRoles {
    plate_id: u32,
    marker_id: u32,
}

impl ToolRoles {
    pub fn resolve(tools: &[String], plate_tool: &str, marker_tool: &str) -> Result<Self, TrackError> {
        if plate_tool == marker_tool {
            return Err(TrackError::Configuration(format!(
                "plate and marker must be distinct tools, both are '{plate_tool}'"
            )));
        }
        let wire_id = |name: &str| -> Result<u32, TrackError> {
            tools
                .iter()
                .position(|t| t == name)
                .map(|idx| idx as u32 + 1)
                .ok_or_else(|| {
                    TrackError::Configuration(format!("tool '{name}' is not in the configured tool list"))
                })
        };
        Ok(Self {
            plate_id: wire_id(plate_tool)?,
            marker_id: wire_id(marker_tool)?,
        })
    }

    pub fn plate_id(&self) -> u32 {
        self.plate_id
    }

    pub fn marker_id(&self) -> u32 {
        self.marker_id
    }

    /// Maps a wire tool identity to its role. Identities outside the two
    /// configured tools return `None` and are ignored upstream.
    pub fn role_of(&self, tool_id: u32) -> Option<ToolRole> {
        if tool_id == self.plate_id {
            Some(ToolRole::Plate)
        } else if tool_id == self.marker_id {
            Some(ToolRole::Marker)
        } else {
            None
        }
    }
}

/// Inbound frame source a locator follows. Trigger names arrive as config
/// strings and resolve here exactly once, at startup; unknown names are a
/// hard configuration failure rather than a silently dead pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameTrigger {
    /// Live pose messages bridged from the Polaris tracking server.
    PolarisPose,
    /// Synthetic or replayed samples from a generator source.
    SampleGenerated,
}

impl FrameTrigger {
    pub fn from_name(name: &str) -> Result<Self, TrackError> {
        match name {
            "POLARIS_POSITION" => Ok(Self::PolarisPose),
            "SAMPLE_GENERATED" => Ok(Self::SampleGenerated),
            other => Err(TrackError::Configuration(format!(
                "unknown trigger name '{other}' (expected POLARIS_POSITION or SAMPLE_GENERATED)"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PolarisPose => "POLARIS_POSITION",
            Self::SampleGenerated => "SAMPLE_GENERATED",
        }
    }
}

/// One pose observation for one tool, as delivered by the tracking source.
///
/// `orientation` keeps the wire ordering `[x, y, z, w]` (scalar last); it is
/// reordered to scalar-first form before any rotation math. `delta_time` is
/// the source's seconds-per-frame and stays fixed for a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoseSample {
    pub tool_id: u32,
    /// Millimetres, tracking-volume frame.
    pub position: [f64; 3],
    pub orientation: [f64; 4],
    pub delta_time: f64,
    pub sequence: u64,
}

/// Projected hotspot pose for one marker sample. Streamed, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HotspotReport {
    pub position: [f64; 3],
    /// Rotated calibration offset; points from the coil marker toward the
    /// hotspot in the current marker attitude.
    pub heading: [f64; 3],
    /// Set when the projection contains non-finite values (marker likely
    /// outside the capture volume). The report is still emitted; consumers
    /// decide what to do with it.
    pub degraded: bool,
    pub sequence: u64,
    pub delta_time: f64,
}

/// Averaged quantities frozen at the end of a collection pass. Orientations
/// are scalar-first `[w, x, y, z]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub plate_orientation: [f64; 4],
    pub plate_position: [f64; 3],
    pub marker_orientation: [f64; 4],
    pub marker_position: [f64; 3],
    /// Xi: mean plate position minus mean marker position.
    pub offset: [f64; 3],
}

/// Unified event wrapper for the headless event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "coiltrack-runtime::locator"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the internal event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A pose observation tagged with the source kind that produced it.
    TrackerFrame {
        trigger: FrameTrigger,
        sample: PoseSample,
    },
    Hotspot(HotspotReport),
    CalibrationComplete(CalibrationSummary),
    CalibrationAborted {
        reason: String,
    },
    /// State-machine transition notice, e.g. "COLLECTING".
    PhaseChanged {
        phase: String,
    },
    DegradedTracking {
        sequence: u64,
    },
    /// Keep-alive probe; answered with `Pong` carrying the module name.
    Ping,
    Pong {
        module: String,
    },
    BeginCalibration,
    Recalibrate,
    Shutdown,
    ShutdownAck {
        module: String,
    },
}

/// Global error type spanning bad samples, bad configuration, and transport
/// failures.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum TrackError {
    /// A calibration sample that cannot be averaged (non-finite components
    /// or a zero-norm orientation). Recoverable: the collection attempt is
    /// aborted and may be restarted.
    #[error("Invalid {role:?} sample: {details}")]
    InvalidSample { role: ToolRole, details: String },

    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Transport Error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_list() -> Vec<String> {
        vec!["CB609".to_string(), "CT315".to_string()]
    }

    #[test]
    fn roles_follow_list_order_plus_one() {
        let roles = ToolRoles::resolve(&tool_list(), "CB609", "CT315").unwrap();
        assert_eq!(roles.plate_id(), 1);
        assert_eq!(roles.marker_id(), 2);
        assert_eq!(roles.role_of(1), Some(ToolRole::Plate));
        assert_eq!(roles.role_of(2), Some(ToolRole::Marker));
        assert_eq!(roles.role_of(3), None);
    }

    #[test]
    fn roles_reject_unknown_tool_name() {
        let err = ToolRoles::resolve(&tool_list(), "CB609", "CT999").unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
        assert!(err.to_string().contains("CT999"));
    }

    #[test]
    fn roles_reject_shared_tool_name() {
        let err = ToolRoles::resolve(&tool_list(), "CB609", "CB609").unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
    }

    #[test]
    fn trigger_names_resolve_to_variants() {
        assert_eq!(
            FrameTrigger::from_name("POLARIS_POSITION").unwrap(),
            FrameTrigger::PolarisPose
        );
        assert_eq!(
            FrameTrigger::from_name("SAMPLE_GENERATED").unwrap(),
            FrameTrigger::SampleGenerated
        );
        assert_eq!(FrameTrigger::PolarisPose.name(), "POLARIS_POSITION");
    }

    #[test]
    fn unknown_trigger_name_is_a_hard_failure() {
        let err = FrameTrigger::from_name("MT_RAW_SPIKECOUNT").unwrap_err();
        assert!(matches!(err, TrackError::Configuration(_)));
    }

    #[test]
    fn pose_sample_roundtrip() {
        let sample = PoseSample {
            tool_id: 2,
            position: [12.5, -3.0, 140.25],
            orientation: [0.0, 0.0, 0.0, 1.0],
            delta_time: 1.0 / 60.0,
            sequence: 42,
        };
        let json = serde_json::to_string(&sample).unwrap();
        let back: PoseSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tool_id, 2);
        assert_eq!(back.sequence, 42);
        assert!((back.orientation[3] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "coiltrack-middleware::replay",
            EventPayload::TrackerFrame {
                trigger: FrameTrigger::SampleGenerated,
                sample: PoseSample {
                    tool_id: 1,
                    position: [0.0, 0.0, 0.0],
                    orientation: [0.0, 0.0, 0.0, 1.0],
                    delta_time: 0.02,
                    sequence: 0,
                },
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(event.source, back.source);
        match back.payload {
            EventPayload::TrackerFrame { trigger, sample } => {
                assert_eq!(trigger, FrameTrigger::SampleGenerated);
                assert_eq!(sample.tool_id, 1);
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn track_error_display() {
        let err = TrackError::InvalidSample {
            role: ToolRole::Marker,
            details: "zero-norm orientation".to_string(),
        };
        assert!(err.to_string().contains("Marker"));
        assert!(err.to_string().contains("zero-norm"));

        let err2 = TrackError::Configuration("bad trigger".to_string());
        assert!(err2.to_string().contains("Configuration"));
    }
}
