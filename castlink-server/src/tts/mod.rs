//! Spoken-message pipeline: queue, playback sink and consumer task

pub mod player;
pub mod queue;
pub mod worker;

pub use player::{AudioSink, CommandSink};
pub use queue::TtsQueue;
pub use worker::TtsWorker;

use castlink_common::events::{WidgetPatch, WidgetSnapshot};
use castlink_common::model::WidgetId;

use crate::fanout::WidgetBroadcaster;

/// Push the current queue depth and autoplay flag to the tts widget.
/// Called after every enqueue/clear/autoplay change.
pub async fn publish_queue_changed(queue: &TtsQueue, broadcaster: &WidgetBroadcaster) {
    let snapshot = queue.snapshot().await;
    let patch = WidgetPatch::TtsQueueChanged {
        queued: snapshot.queued,
        autoplay: snapshot.autoplay,
    };
    broadcaster
        .publish(WidgetId::Tts, WidgetSnapshot::Tts(snapshot), patch)
        .await;
}
