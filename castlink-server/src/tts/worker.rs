//! TTS consumer task
//!
//! The single consumer of the queue: dequeue, synthesize with whichever
//! engine is active at that moment, play, publish. At most one request is
//! ever in the synthesizing/playing stage. Synthesis or playback failure
//! drops the request and the queue advances; the loop itself never exits
//! except at shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use castlink_common::events::{WidgetPatch, WidgetSnapshot};
use castlink_common::model::WidgetId;

use crate::fanout::WidgetBroadcaster;
use crate::synth::{EngineSelector, SynthOptions};
use crate::tts::player::AudioSink;
use crate::tts::queue::TtsQueue;

pub struct TtsWorker {
    pub queue: Arc<TtsQueue>,
    pub selector: Arc<EngineSelector>,
    pub sink: Arc<dyn AudioSink>,
    pub broadcaster: Arc<WidgetBroadcaster>,
    pub options: SynthOptions,
    pub synth_timeout: Duration,
    /// Silence between consecutive utterances
    pub gap: Duration,
}

impl TtsWorker {
    pub async fn run(self) {
        loop {
            let request = self.queue.dequeue().await;
            debug!("speaking request {} from {}", request.id, request.sender_id);

            let snapshot = self.queue.begin(&request).await;
            self.broadcaster
                .publish(
                    WidgetId::Tts,
                    WidgetSnapshot::Tts(snapshot),
                    WidgetPatch::TtsStarted {
                        request_id: request.id,
                        sender_id: request.sender_id.clone(),
                        text: request.text.clone(),
                    },
                )
                .await;

            // bind to the engine active right now; a later switch does not
            // affect this request
            let engine = self.selector.current().await;
            let options = SynthOptions {
                translate_to: request.translate_to.clone(),
                ..self.options.clone()
            };
            let skipped = match timeout(
                self.synth_timeout,
                engine.synthesize(&request.text, &options),
            )
            .await
            {
                Ok(Ok(audio)) => match self.sink.play(&audio).await {
                    Ok(()) => false,
                    Err(e) => {
                        warn!("playback failed for {}: {e}", request.id);
                        true
                    }
                },
                Ok(Err(e)) => {
                    warn!("synthesis failed for {}: {e}", request.id);
                    true
                }
                Err(_) => {
                    warn!(
                        "synthesis timed out after {:?} for {}",
                        self.synth_timeout, request.id
                    );
                    true
                }
            };

            let snapshot = self.queue.finish().await;
            self.broadcaster
                .publish(
                    WidgetId::Tts,
                    WidgetSnapshot::Tts(snapshot),
                    WidgetPatch::TtsFinished {
                        request_id: request.id,
                        skipped,
                    },
                )
                .await;

            // the gap separates spoken utterances; a skipped request played
            // nothing, so the next one starts immediately
            if !skipped {
                tokio::time::sleep(self.gap).await;
            }
        }
    }
}
