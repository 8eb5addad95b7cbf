//! Rule engine: normalized events in, state mutations and widget pushes out
//!
//! The single dispatch task consumes the event channel in order. Every
//! store mutation is paired with its push here, so widgets always see the
//! snapshot that matches the patch. Invalid events are dropped with a
//! diagnostic; the loop never crashes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use castlink_common::config::{SoundClipConfig, SoundsConfig, TtsConfig};
use castlink_common::events::{VotingSnapshot, WidgetPatch, WidgetSnapshot};
use castlink_common::model::{
    EventKind, GuardTier, NormalizedEvent, TtsOrigin, TtsRequest, WidgetId,
};

use crate::error::{Error, Result};
use crate::fanout::WidgetBroadcaster;
use crate::store::Store;
use crate::tts::{publish_queue_changed, TtsQueue};
use crate::webhook::WebhookNotifier;

pub struct Dispatcher {
    store: Arc<Store>,
    broadcaster: Arc<WidgetBroadcaster>,
    queue: Arc<TtsQueue>,
    webhooks: Arc<WebhookNotifier>,
    /// Event kinds eligible for speech
    speak_kinds: HashSet<String>,
    /// Chat token -> sound clip
    sounds: HashMap<String, SoundClipConfig>,
    /// Translation target attached to spoken viewer-authored text
    translate_to: Option<String>,
    /// Serializes each store mutation with its publish. Operator calls run
    /// concurrently with the dispatch task; without this, a publish could
    /// slip between another mutation and its publish and leave the retained
    /// snapshot behind the store.
    publish_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        broadcaster: Arc<WidgetBroadcaster>,
        queue: Arc<TtsQueue>,
        webhooks: Arc<WebhookNotifier>,
        tts: &TtsConfig,
        sounds: &SoundsConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            queue,
            webhooks,
            speak_kinds: tts.speak_kinds.iter().cloned().collect(),
            sounds: sounds.commands.clone(),
            translate_to: tts.translate_to.clone(),
            publish_lock: Mutex::new(()),
        }
    }

    /// Consume the event channel until it closes
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<NormalizedEvent>) {
        info!("dispatcher started");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("dispatcher stopped: event channel closed");
    }

    /// Apply one event. Never fails; problems are logged and the event is
    /// dropped.
    pub async fn handle(&self, event: NormalizedEvent) {
        debug!(
            kind = event.kind.name(),
            sender = %event.sender_id,
            "dispatching event"
        );

        match &event.kind {
            EventKind::Gift { .. } | EventKind::Superchat { .. } => {
                self.apply_monetization(&event).await;
                self.maybe_speak(&event).await;
            }
            EventKind::Membership {
                tier,
                periods,
                value,
            } => {
                self.apply_monetization(&event).await;
                // one new guard member regardless of periods purchased
                self.apply_counter(WidgetId::GuardProgress, 1.0).await;
                self.notify_membership(*tier, &event, *periods, *value);
                self.maybe_speak(&event).await;
            }
            EventKind::ChatMessage { text } => {
                if let Some(clip) = self.sounds.get(text.trim()) {
                    self.play_sound(text.trim(), clip).await;
                } else {
                    self.maybe_speak(&event).await;
                }
            }
            EventKind::VoteCast { option_index } => {
                self.apply_vote(&event.sender_id, *option_index).await;
            }
        }
    }

    async fn apply_monetization(&self, event: &NormalizedEvent) {
        match event.amount() {
            // free gifts carry no monetary value and move nothing
            Some(amount) if amount > 0.0 => {
                self.apply_counter(WidgetId::Monetization, amount).await;
            }
            _ => {}
        }
    }

    /// Fire the guard-tier webhook without blocking the dispatch loop
    fn notify_membership(&self, tier: GuardTier, event: &NormalizedEvent, periods: u32, value: f64) {
        let notifier = self.webhooks.clone();
        let sender = event.sender_id.clone();
        let timestamp = event.timestamp;
        tokio::spawn(async move {
            notifier
                .notify_membership(tier, &sender, periods, value, timestamp)
                .await;
        });
    }

    async fn apply_counter(&self, widget: WidgetId, delta: f64) {
        let _publish = self.publish_lock.lock().await;
        let (snapshot, hits) = match self.store.apply(widget, delta).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("counter apply failed on {widget}: {e}");
                return;
            }
        };

        let current_value = snapshot.current_value;
        self.broadcaster
            .publish(
                widget,
                WidgetSnapshot::Counter(snapshot.clone()),
                WidgetPatch::ProgressChanged {
                    current_value,
                    delta,
                },
            )
            .await;

        if !hits.is_empty() {
            info!(
                "{widget} crossed {} milestone(s), highest threshold {}",
                hits.len(),
                hits[hits.len() - 1].threshold
            );
            self.broadcaster
                .publish(
                    widget,
                    WidgetSnapshot::Counter(snapshot),
                    WidgetPatch::MilestonesReached { hits },
                )
                .await;
        }
    }

    async fn apply_vote(&self, sender_id: &str, option_index: usize) {
        let _publish = self.publish_lock.lock().await;
        match self.store.vote_cast(sender_id, option_index).await {
            Ok(snapshot) => {
                let tallies = snapshot.tallies.clone();
                self.broadcaster
                    .publish(
                        WidgetId::Voting,
                        WidgetSnapshot::Voting(snapshot),
                        WidgetPatch::VoteUpdated { tallies },
                    )
                    .await;
            }
            Err(Error::VoteNotRunning) => {
                debug!("vote cast from {sender_id} dropped: no session running");
            }
            Err(e) => {
                debug!("vote cast from {sender_id} dropped: {e}");
            }
        }
    }

    async fn play_sound(&self, token: &str, clip: &SoundClipConfig) {
        info!("sound command {token} -> {}", clip.file);
        self.broadcaster
            .publish(
                WidgetId::Sounds,
                WidgetSnapshot::Sounds,
                WidgetPatch::SoundClip {
                    token: token.to_string(),
                    file: clip.file.clone(),
                    volume: clip.volume,
                },
            )
            .await;
    }

    async fn maybe_speak(&self, event: &NormalizedEvent) {
        if !self.speak_kinds.contains(event.kind.name()) {
            return;
        }
        let request = match &event.kind {
            EventKind::Superchat { amount, message } => TtsRequest::new(
                &event.sender_id,
                format!("{} says: {}", event.sender_id, message),
                TtsOrigin::Superchat { amount: *amount },
            )
            .with_translate_to(self.translate_to.clone()),
            EventKind::Membership { tier, .. } => TtsRequest::new(
                &event.sender_id,
                format!("{}, thank you for your support!", event.sender_id),
                TtsOrigin::Membership { tier: *tier },
            ),
            EventKind::Gift {
                gift_name,
                quantity,
                ..
            } => TtsRequest::new(
                &event.sender_id,
                format!(
                    "{}, thank you for the {gift_name} x {quantity}!",
                    event.sender_id
                ),
                TtsOrigin::Chat,
            ),
            EventKind::ChatMessage { text } => TtsRequest::new(
                &event.sender_id,
                format!("{} says: {}", event.sender_id, text),
                TtsOrigin::Chat,
            )
            .with_translate_to(self.translate_to.clone()),
            EventKind::VoteCast { .. } => return,
        };

        self.queue.enqueue(request).await;
        publish_queue_changed(&self.queue, &self.broadcaster).await;
    }

    // Control-surface operations: the operator panel mutates voting and
    // counters through the dispatcher so every change is published.

    pub async fn start_vote(
        &self,
        question: String,
        options: Vec<String>,
    ) -> Result<VotingSnapshot> {
        let _publish = self.publish_lock.lock().await;
        let snapshot = self.store.vote_start(question.clone(), options.clone()).await?;
        let tallies = snapshot.tallies.clone();
        self.broadcaster
            .publish(
                WidgetId::Voting,
                WidgetSnapshot::Voting(snapshot.clone()),
                WidgetPatch::VoteStarted {
                    question,
                    options,
                    tallies,
                },
            )
            .await;
        Ok(snapshot)
    }

    pub async fn stop_vote(&self) -> Result<VotingSnapshot> {
        let _publish = self.publish_lock.lock().await;
        let snapshot = self.store.vote_stop().await?;
        let tallies = snapshot.tallies.clone();
        self.broadcaster
            .publish(
                WidgetId::Voting,
                WidgetSnapshot::Voting(snapshot.clone()),
                WidgetPatch::VoteStopped { tallies },
            )
            .await;
        Ok(snapshot)
    }

    pub async fn reset_vote(&self) -> VotingSnapshot {
        let _publish = self.publish_lock.lock().await;
        let snapshot = self.store.vote_reset().await;
        self.broadcaster
            .publish(
                WidgetId::Voting,
                WidgetSnapshot::Voting(snapshot.clone()),
                WidgetPatch::VoteReset,
            )
            .await;
        snapshot
    }

    /// Explicit counter reset (operator action, never automatic)
    pub async fn reset_counter(&self, widget: WidgetId) -> Result<()> {
        let _publish = self.publish_lock.lock().await;
        let snapshot = self.store.reset(widget).await?;
        self.broadcaster
            .publish(
                widget,
                WidgetSnapshot::Counter(snapshot),
                WidgetPatch::CounterReset,
            )
            .await;
        Ok(())
    }
}
