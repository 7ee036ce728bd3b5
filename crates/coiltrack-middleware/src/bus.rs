//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into four [`Topic`] lanes so components only
//! receive the messages they care about:
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::TrackerFrames`] | High-frequency pose samples from the tracking source |
//! | [`Topic::HotspotReports`] | Projected hotspot poses, one per marker frame |
//! | [`Topic::Control`] | Ping/pong keep-alives, begin/recalibrate, shutdown |
//! | [`Topic::Diagnostics`] | Phase changes, aborts, degraded-tracking notices |

use coiltrack_types::{Event, TrackError};
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all first-class routing topics on the event bus.
///
/// Publishers and subscribers reference a `Topic` variant to ensure
/// messages are delivered only to the correct topic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// High-frequency pose samples flowing in from the tracking source.
    TrackerFrames,
    /// Projected hotspot results flowing out to consumers.
    HotspotReports,
    /// Keep-alives and operator commands: ping, begin, recalibrate, shutdown.
    Control,
    /// Observability traffic: phase changes, aborts, degraded tracking.
    Diagnostics,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    tracker_frames: broadcast::Sender<Event>,
    hotspot_reports: broadcast::Sender<Event>,
    control: broadcast::Sender<Event>,
    diagnostics: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (tracker_frames, _) = broadcast::channel(capacity);
        let (hotspot_reports, _) = broadcast::channel(capacity);
        let (control, _) = broadcast::channel(capacity);
        let (diagnostics, _) = broadcast::channel(capacity);
        Self {
            tracker_frames,
            hotspot_reports,
            control,
            diagnostics,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event,
    /// or [`TrackError::Transport`] when nobody is subscribed to the topic.
    /// Fire-and-forget publishers may ignore that error; for reports it
    /// usually means the consumer went away.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, TrackError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| TrackError::Transport(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    ///
    /// The returned [`TopicReceiver`] yields only events published to that
    /// topic, in publish order.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::TrackerFrames => &self.tracker_frames,
            Topic::HotspotReports => &self.hotspot_reports,
            Topic::Control => &self.control,
            Topic::Diagnostics => &self.diagnostics,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiltrack_types::EventPayload;

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::Ping)
    }

    #[tokio::test]
    async fn publish_and_receive_on_a_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Control);

        let event = make_event("coiltrack-middleware::test");
        bus.publish_to(Topic::Control, event.clone())?;

        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        assert_eq!(received.source, event.source);
        Ok(())
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe_to(Topic::TrackerFrames);
        let mut rx2 = bus.subscribe_to(Topic::TrackerFrames);

        let event = make_event("polaris::frame");
        bus.publish_to(Topic::TrackerFrames, event.clone())?;

        assert_eq!(rx1.recv().await?.id, event.id);
        assert_eq!(rx2.recv().await?.id, event.id);
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_returns_transport_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::HotspotReports, make_event("test"));
        assert!(matches!(result, Err(TrackError::Transport(_))));
    }

    /// A subscriber on `Diagnostics` must not receive events published to
    /// `TrackerFrames` because they are routed through separate channels.
    #[tokio::test]
    async fn topics_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut diag_sub = bus.subscribe_to(Topic::Diagnostics);
        let _frames_sub = bus.subscribe_to(Topic::TrackerFrames);

        bus.publish_to(Topic::TrackerFrames, make_event("polaris::frame"))?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            diag_sub.recv(),
        )
        .await;

        assert!(
            result.is_err(),
            "Diagnostics subscriber must not receive a TrackerFrames event"
        );
        Ok(())
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        const CAPACITY: usize = 64;
        let bus = EventBus::new(CAPACITY);
        let mut slow_sub = bus.subscribe_to(Topic::TrackerFrames);

        for _ in 0..10_000 {
            let _ = bus.publish_to(Topic::TrackerFrames, make_event("flood::frame"));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }
}
