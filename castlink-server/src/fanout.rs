//! Per-widget fan-out broadcaster
//!
//! One broadcast channel per widget category. Each slot pairs the channel
//! with a monotonic version and the latest full snapshot, all behind one
//! mutex: `publish` stamps the next version and stores the snapshot in the
//! same critical section, and `subscribe` reads the snapshot and opens the
//! receiver in one critical section. A new subscriber therefore gets a
//! snapshot at version V and then every delta with version > V — no gap, no
//! duplicate.
//!
//! Sends to zero receivers are no-ops; disconnected receivers are pruned by
//! the tokio broadcast channel itself.

use axum::response::sse::Event;
use futures::Stream;
use futures::StreamExt;
use std::convert::Infallible;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use castlink_common::events::{
    CounterSnapshot, TtsSnapshot, VotingSnapshot, WidgetPatch, WidgetPush, WidgetSnapshot,
};
use castlink_common::model::WidgetId;

/// Initial state for every widget slot, captured at startup
pub struct InitialSnapshots {
    pub monetization: CounterSnapshot,
    pub guard_progress: CounterSnapshot,
    pub voting: VotingSnapshot,
    pub tts: TtsSnapshot,
}

pub struct WidgetBroadcaster {
    monetization: Mutex<Slot>,
    guard_progress: Mutex<Slot>,
    voting: Mutex<Slot>,
    tts: Mutex<Slot>,
    sounds: Mutex<Slot>,
}

struct Slot {
    tx: broadcast::Sender<WidgetPush>,
    version: u64,
    snapshot: WidgetSnapshot,
}

impl Slot {
    fn new(capacity: usize, snapshot: WidgetSnapshot) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            version: 0,
            snapshot,
        }
    }
}

impl WidgetBroadcaster {
    /// Create a broadcaster with one slot per widget category
    ///
    /// # Arguments
    ///
    /// * `capacity` - Per-widget delta buffer (recommended: 100)
    pub fn new(capacity: usize, initial: InitialSnapshots) -> Self {
        Self {
            monetization: Mutex::new(Slot::new(
                capacity,
                WidgetSnapshot::Counter(initial.monetization),
            )),
            guard_progress: Mutex::new(Slot::new(
                capacity,
                WidgetSnapshot::Counter(initial.guard_progress),
            )),
            voting: Mutex::new(Slot::new(capacity, WidgetSnapshot::Voting(initial.voting))),
            tts: Mutex::new(Slot::new(capacity, WidgetSnapshot::Tts(initial.tts))),
            sounds: Mutex::new(Slot::new(capacity, WidgetSnapshot::Sounds)),
        }
    }

    fn slot(&self, widget: WidgetId) -> &Mutex<Slot> {
        match widget {
            WidgetId::Monetization => &self.monetization,
            WidgetId::GuardProgress => &self.guard_progress,
            WidgetId::Voting => &self.voting,
            WidgetId::Tts => &self.tts,
            WidgetId::Sounds => &self.sounds,
        }
    }

    /// Publish a state change: stamp the next version, retain `snapshot` as
    /// the widget's latest full state, and broadcast the delta. Returns the
    /// stamped version.
    pub async fn publish(
        &self,
        widget: WidgetId,
        snapshot: WidgetSnapshot,
        patch: WidgetPatch,
    ) -> u64 {
        let mut slot = self.slot(widget).lock().await;
        slot.version += 1;
        slot.snapshot = snapshot;
        let push = WidgetPush::Delta {
            widget_id: widget,
            version: slot.version,
            patch,
        };
        // zero receivers is fine
        if let Ok(count) = slot.tx.send(push) {
            debug!(widget = %widget, version = slot.version, "broadcast delta to {count} subscribers");
        }
        slot.version
    }

    /// Open a subscription: the current snapshot push plus a receiver that
    /// will yield every delta published after it
    pub async fn subscribe(&self, widget: WidgetId) -> (broadcast::Receiver<WidgetPush>, WidgetPush) {
        let slot = self.slot(widget).lock().await;
        let rx = slot.tx.subscribe();
        let snapshot = WidgetPush::Snapshot {
            widget_id: widget,
            version: slot.version,
            state: slot.snapshot.clone(),
        };
        (rx, snapshot)
    }

    /// Latest snapshot push for the widget (for the one-shot GET endpoint)
    pub async fn snapshot(&self, widget: WidgetId) -> WidgetPush {
        let slot = self.slot(widget).lock().await;
        WidgetPush::Snapshot {
            widget_id: widget,
            version: slot.version,
            state: slot.snapshot.clone(),
        }
    }

    pub async fn subscriber_count(&self, widget: WidgetId) -> usize {
        self.slot(widget).lock().await.tx.receiver_count()
    }

    /// SSE stream for a new widget subscriber: snapshot event first, then
    /// deltas newer than the snapshot. Lagged receivers log and continue.
    pub async fn subscribe_stream(
        &self,
        widget: WidgetId,
    ) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
        let (rx, snapshot) = self.subscribe(widget).await;
        let snap_version = snapshot.version();

        async_stream::stream! {
            if let Ok(event) = Event::default().event("snapshot").json_data(&snapshot) {
                yield Ok(event);
            }

            let mut deltas = BroadcastStream::new(rx);
            while let Some(result) = deltas.next().await {
                match result {
                    Ok(push) if push.version() > snap_version => {
                        if let Ok(event) = Event::default().event("delta").json_data(&push) {
                            yield Ok(event);
                        }
                    }
                    // delta already covered by the snapshot
                    Ok(_) => {}
                    Err(e) => {
                        warn!(widget = %widget, "subscriber lagged: {e:?}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castlink_common::events::VoteStatus;

    fn initial() -> InitialSnapshots {
        InitialSnapshots {
            monetization: CounterSnapshot {
                current_value: 0.0,
                reached: vec![],
                next_threshold: None,
            },
            guard_progress: CounterSnapshot {
                current_value: 0.0,
                reached: vec![],
                next_threshold: None,
            },
            voting: VotingSnapshot {
                status: VoteStatus::Idle,
                question: None,
                options: vec![],
                tallies: vec![],
            },
            tts: TtsSnapshot {
                autoplay: false,
                queued: 0,
                now_playing: None,
            },
        }
    }

    fn counter(value: f64) -> WidgetSnapshot {
        WidgetSnapshot::Counter(CounterSnapshot {
            current_value: value,
            reached: vec![],
            next_threshold: None,
        })
    }

    #[tokio::test]
    async fn test_versions_are_per_widget_monotonic() {
        let b = WidgetBroadcaster::new(16, initial());
        let v1 = b
            .publish(
                WidgetId::Monetization,
                counter(10.0),
                WidgetPatch::ProgressChanged {
                    current_value: 10.0,
                    delta: 10.0,
                },
            )
            .await;
        let v2 = b
            .publish(
                WidgetId::Monetization,
                counter(20.0),
                WidgetPatch::ProgressChanged {
                    current_value: 20.0,
                    delta: 10.0,
                },
            )
            .await;
        assert_eq!((v1, v2), (1, 2));
        // other widgets unaffected
        assert_eq!(b.snapshot(WidgetId::Voting).await.version(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_sees_snapshot_then_only_newer_deltas() {
        let b = WidgetBroadcaster::new(16, initial());
        b.publish(
            WidgetId::Monetization,
            counter(10.0),
            WidgetPatch::ProgressChanged {
                current_value: 10.0,
                delta: 10.0,
            },
        )
        .await;

        let (mut rx, snapshot) = b.subscribe(WidgetId::Monetization).await;
        assert_eq!(snapshot.version(), 1);
        match &snapshot {
            WidgetPush::Snapshot {
                state: WidgetSnapshot::Counter(c),
                ..
            } => assert_eq!(c.current_value, 10.0),
            other => panic!("expected counter snapshot, got {other:?}"),
        }

        b.publish(
            WidgetId::Monetization,
            counter(25.0),
            WidgetPatch::ProgressChanged {
                current_value: 25.0,
                delta: 15.0,
            },
        )
        .await;

        let delta = rx.recv().await.unwrap();
        assert_eq!(delta.version(), 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let b = WidgetBroadcaster::new(16, initial());
        let v = b
            .publish(WidgetId::Voting, WidgetSnapshot::Sounds, WidgetPatch::VoteReset)
            .await;
        assert_eq!(v, 1);
    }
}
