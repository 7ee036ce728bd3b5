//! File replay adapter.
//!
//! [`ReplayAdapter`] drives the locator without any tracking hardware: it
//! reads pose samples recorded as JSON Lines (one [`PoseSample`] object per
//! line), paces them by each sample's own frame period, and hands them out
//! tagged [`FrameTrigger::SampleGenerated`]. Projected reports delivered back
//! to the adapter are traced rather than sent anywhere.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use coiltrack_types::{EventPayload, FrameTrigger, HotspotReport, PoseSample, TrackError};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tracing::info;

use crate::adapter::TrackerAdapter;

/// Adapter that replays a recorded sample file as a live frame stream.
#[derive(Debug)]
pub struct ReplayAdapter {
    samples: Vec<PoseSample>,
}

impl ReplayAdapter {
    /// Load a JSON Lines recording. Blank lines are skipped; any
    /// unparseable line fails the whole load.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TrackError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrackError::Transport(format!("cannot read replay file {}: {e}", path.display()))
        })?;
        let mut samples = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let sample: PoseSample = serde_json::from_str(line).map_err(|e| {
                TrackError::Transport(format!("replay line {}: {e}", index + 1))
            })?;
            samples.push(sample);
        }
        info!(count = samples.len(), file = %path.display(), "replay recording loaded");
        Ok(Self { samples })
    }

    pub fn from_samples(samples: Vec<PoseSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl TrackerAdapter for ReplayAdapter {
    /// Emit the recording in order. Each sample waits out its own
    /// `delta_time` first, approximating the original capture rate; samples
    /// with a zero or non-finite period are emitted immediately.
    async fn frame_stream(&self) -> BoxStream<'static, EventPayload> {
        stream::iter(self.samples.clone())
            .then(|sample| async move {
                if sample.delta_time.is_finite() && sample.delta_time > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(sample.delta_time)).await;
                }
                EventPayload::TrackerFrame {
                    trigger: FrameTrigger::SampleGenerated,
                    sample,
                }
            })
            .boxed()
    }

    async fn deliver_report(&self, report: HotspotReport) -> Result<(), TrackError> {
        info!(
            sequence = report.sequence,
            x = report.position[0],
            y = report.position[1],
            z = report.position[2],
            degraded = report.degraded,
            "hotspot report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tool_id: u32, sequence: u64) -> PoseSample {
        PoseSample {
            tool_id,
            position: [1.0, 2.0, 3.0],
            orientation: [0.0, 0.0, 0.0, 1.0],
            delta_time: 0.0,
            sequence,
        }
    }

    #[tokio::test]
    async fn replays_every_line_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.jsonl");
        let lines = [
            serde_json::to_string(&sample(1, 0)).unwrap(),
            String::new(),
            serde_json::to_string(&sample(2, 1)).unwrap(),
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let adapter = ReplayAdapter::from_path(&path).unwrap();
        assert_eq!(adapter.len(), 2);

        let payloads: Vec<EventPayload> = adapter.frame_stream().await.collect().await;
        assert_eq!(payloads.len(), 2);
        match &payloads[0] {
            EventPayload::TrackerFrame { trigger, sample } => {
                assert_eq!(*trigger, FrameTrigger::SampleGenerated);
                assert_eq!(sample.tool_id, 1);
                assert_eq!(sample.sequence, 0);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        match &payloads[1] {
            EventPayload::TrackerFrame { sample, .. } => assert_eq!(sample.sequence, 1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn malformed_line_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{\"tool_id\": \"not a number\"}").unwrap();

        let err = ReplayAdapter::from_path(&path).unwrap_err();
        assert!(matches!(err, TrackError::Transport(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn missing_file_is_a_transport_error() {
        let err = ReplayAdapter::from_path("/nonexistent/recording.jsonl").unwrap_err();
        assert!(matches!(err, TrackError::Transport(_)));
    }

    #[tokio::test]
    async fn reports_are_accepted() {
        let adapter = ReplayAdapter::from_samples(vec![]);
        let report = HotspotReport {
            position: [1.0, 2.0, 3.0],
            heading: [1.0, 0.0, 0.0],
            degraded: false,
            sequence: 7,
            delta_time: 0.02,
        };
        assert!(adapter.deliver_report(report).await.is_ok());
    }
}
