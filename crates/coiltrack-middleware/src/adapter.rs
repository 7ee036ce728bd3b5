//! The adapter seam.
//!
//! The locator never speaks to a tracking server or a downstream consumer
//! directly. It reads and writes the internal
//! [`EventBus`][crate::bus::EventBus]; adapters sit at the edge and translate
//! between bus payloads and whatever protocol the outside world speaks.
//!
//! # Overview
//!
//! - [`TrackerAdapter`] – the trait every bridge must implement.
//! - [`ReplayAdapter`][crate::replay::ReplayAdapter] – replays recorded
//!   samples from disk for demos and tests.
//!
//! A live Polaris TCP bridge implements the same trait out of tree.

use async_trait::async_trait;
use coiltrack_types::{EventPayload, HotspotReport, TrackError};
use futures_util::stream::BoxStream;

/// Every external-protocol bridge must implement this trait.
///
/// # Contract
///
/// * `frame_stream` – returns a live stream of [`EventPayload`] values the
///   adapter produces by translating inbound tracking data into bus events
///   (normally `TrackerFrame` payloads tagged with the adapter's trigger).
///
/// * `deliver_report` – receives each projected [`HotspotReport`] and
///   forwards it to the external consumer (a TCP peer, a log, a stimulator).
#[async_trait]
pub trait TrackerAdapter: Send + Sync {
    /// Translate inbound tracking data into a stream of bus payloads.
    async fn frame_stream(&self) -> BoxStream<'static, EventPayload>;

    /// Forward one projected hotspot report to the external consumer.
    async fn deliver_report(&self, report: HotspotReport) -> Result<(), TrackError>;
}
