//! Dispatcher integration tests
//!
//! Exercise the event pipeline end to end: normalized events in, store
//! mutations and widget pushes out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::timeout;

use castlink_common::config::{
    CounterConfig, MilestoneConfig, SoundClipConfig, SoundsConfig, TtsConfig, WebhooksConfig,
    WidgetsConfig,
};
use castlink_common::events::{WidgetPatch, WidgetPush, WidgetSnapshot};
use castlink_common::model::{EventKind, GuardTier, NormalizedEvent, WidgetId};
use castlink_server::dispatch::Dispatcher;
use castlink_server::fanout::{InitialSnapshots, WidgetBroadcaster};
use castlink_server::store::Store;
use castlink_server::tts::TtsQueue;
use castlink_server::webhook::WebhookNotifier;

struct Fixture {
    store: Arc<Store>,
    broadcaster: Arc<WidgetBroadcaster>,
    queue: Arc<TtsQueue>,
    dispatcher: Arc<Dispatcher>,
}

async fn setup() -> Fixture {
    setup_with_tts(TtsConfig::default()).await
}

async fn setup_with_tts(tts: TtsConfig) -> Fixture {
    let widgets = WidgetsConfig {
        monetization: CounterConfig {
            milestones: vec![
                MilestoneConfig {
                    threshold: 10.0,
                    payload: "ten".into(),
                },
                MilestoneConfig {
                    threshold: 20.0,
                    payload: "twenty".into(),
                },
                MilestoneConfig {
                    threshold: 30.0,
                    payload: "thirty".into(),
                },
            ],
        },
        guard_progress: CounterConfig { milestones: vec![] },
    };
    let store = Arc::new(Store::new(&widgets).unwrap());
    let queue = Arc::new(TtsQueue::new(true, None, true));
    let broadcaster = Arc::new(WidgetBroadcaster::new(
        64,
        InitialSnapshots {
            monetization: store.counter_snapshot(WidgetId::Monetization).await.unwrap(),
            guard_progress: store
                .counter_snapshot(WidgetId::GuardProgress)
                .await
                .unwrap(),
            voting: store.voting_snapshot().await,
            tts: queue.snapshot().await,
        },
    ));

    let sounds = SoundsConfig {
        commands: HashMap::from([(
            "!horn".to_string(),
            SoundClipConfig {
                file: "horn.ogg".to_string(),
                volume: 0.8,
            },
        )]),
    };
    let webhooks = Arc::new(WebhookNotifier::new(&WebhooksConfig::default()));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        broadcaster.clone(),
        queue.clone(),
        webhooks,
        &tts,
        &sounds,
    ));

    Fixture {
        store,
        broadcaster,
        queue,
        dispatcher,
    }
}

fn event(sender: &str, kind: EventKind) -> NormalizedEvent {
    NormalizedEvent::new(sender, Utc::now(), kind)
}

fn superchat(sender: &str, amount: f64) -> NormalizedEvent {
    event(
        sender,
        EventKind::Superchat {
            amount,
            message: "hello".into(),
        },
    )
}

fn paid_gift(sender: &str, value: f64) -> NormalizedEvent {
    event(
        sender,
        EventKind::Gift {
            gift_name: "flower".into(),
            quantity: 1,
            value,
        },
    )
}

async fn next_push(rx: &mut broadcast::Receiver<WidgetPush>) -> WidgetPush {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for push")
        .expect("broadcast closed")
}

fn patch_of(push: WidgetPush) -> WidgetPatch {
    match push {
        WidgetPush::Delta { patch, .. } => patch,
        other => panic!("expected delta, got {other:?}"),
    }
}

#[tokio::test]
async fn test_monetization_accumulates_and_batches_milestones() {
    let fx = setup().await;
    let (mut rx, snapshot) = fx.broadcaster.subscribe(WidgetId::Monetization).await;
    assert_eq!(snapshot.version(), 0);

    fx.dispatcher.handle(superchat("alice", 5.0)).await;
    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::ProgressChanged {
            current_value,
            delta,
        } => {
            assert_eq!(current_value, 5.0);
            assert_eq!(delta, 5.0);
        }
        other => panic!("unexpected patch {other:?}"),
    }

    // one delta crossing three thresholds fires one ascending batch
    fx.dispatcher.handle(paid_gift("bob", 30.0)).await;
    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::ProgressChanged { current_value, .. } => {
            assert_eq!(current_value, 35.0);
        }
        other => panic!("unexpected patch {other:?}"),
    }
    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::MilestonesReached { hits } => {
            let thresholds: Vec<f64> = hits.iter().map(|h| h.threshold).collect();
            assert_eq!(thresholds, vec![10.0, 20.0, 30.0]);
            assert_eq!(hits[0].payload, "ten");
        }
        other => panic!("unexpected patch {other:?}"),
    }

    // no re-trigger on further progress
    fx.dispatcher.handle(superchat("carol", 50.0)).await;
    assert!(matches!(
        patch_of(next_push(&mut rx).await),
        WidgetPatch::ProgressChanged { .. }
    ));
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "milestones must not fire twice"
    );
}

#[tokio::test]
async fn test_free_gift_moves_nothing() {
    let fx = setup().await;
    let (mut rx, _) = fx.broadcaster.subscribe(WidgetId::Monetization).await;

    fx.dispatcher.handle(paid_gift("alice", 0.0)).await;

    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    let snap = fx
        .store
        .counter_snapshot(WidgetId::Monetization)
        .await
        .unwrap();
    assert_eq!(snap.current_value, 0.0);
}

#[tokio::test]
async fn test_membership_updates_both_counters_and_speaks_thanks() {
    let fx = setup().await;

    fx.dispatcher
        .handle(event(
            "大哥",
            EventKind::Membership {
                tier: GuardTier::Captain,
                periods: 1,
                value: 138.0,
            },
        ))
        .await;

    let monetization = fx
        .store
        .counter_snapshot(WidgetId::Monetization)
        .await
        .unwrap();
    assert_eq!(monetization.current_value, 138.0);

    let guard = fx
        .store
        .counter_snapshot(WidgetId::GuardProgress)
        .await
        .unwrap();
    assert_eq!(guard.current_value, 1.0);

    let request = timeout(Duration::from_secs(1), fx.queue.dequeue())
        .await
        .expect("no tts request enqueued");
    assert_eq!(request.text, "大哥, thank you for your support!");
}

#[tokio::test]
async fn test_superchat_speaks_with_says_phrasing() {
    let fx = setup().await;
    fx.dispatcher.handle(superchat("alice", 30.0)).await;

    let request = timeout(Duration::from_secs(1), fx.queue.dequeue())
        .await
        .expect("no tts request enqueued");
    assert_eq!(request.text, "alice says: hello");
}

#[tokio::test]
async fn test_plain_chat_is_not_spoken_by_default() {
    let fx = setup().await;
    fx.dispatcher
        .handle(event("alice", EventKind::ChatMessage { text: "hi".into() }))
        .await;
    assert_eq!(fx.queue.snapshot().await.queued, 0);
}

#[tokio::test]
async fn test_sound_command_pushes_clip_instead_of_speech() {
    let fx = setup().await;
    let (mut rx, _) = fx.broadcaster.subscribe(WidgetId::Sounds).await;

    fx.dispatcher
        .handle(event(
            "alice",
            EventKind::ChatMessage {
                text: "!horn".into(),
            },
        ))
        .await;

    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::SoundClip {
            token,
            file,
            volume,
        } => {
            assert_eq!(token, "!horn");
            assert_eq!(file, "horn.ogg");
            assert_eq!(volume, 0.8);
        }
        other => panic!("unexpected patch {other:?}"),
    }
    assert_eq!(fx.queue.snapshot().await.queued, 0);
}

#[tokio::test]
async fn test_vote_lifecycle_via_dispatcher() {
    let fx = setup().await;
    let (mut rx, _) = fx.broadcaster.subscribe(WidgetId::Voting).await;

    fx.dispatcher
        .start_vote("next game?".into(), vec!["a".into(), "b".into()])
        .await
        .unwrap();
    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::VoteStarted { tallies, .. } => assert_eq!(tallies, vec![0, 0]),
        other => panic!("unexpected patch {other:?}"),
    }

    fx.dispatcher
        .handle(event("alice", EventKind::VoteCast { option_index: 1 }))
        .await;
    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::VoteUpdated { tallies } => assert_eq!(tallies, vec![0, 1]),
        other => panic!("unexpected patch {other:?}"),
    }

    fx.dispatcher.stop_vote().await.unwrap();
    match patch_of(next_push(&mut rx).await) {
        WidgetPatch::VoteStopped { tallies } => assert_eq!(tallies, vec![0, 1]),
        other => panic!("unexpected patch {other:?}"),
    }

    // casts after stop are dropped without a push
    fx.dispatcher
        .handle(event("bob", EventKind::VoteCast { option_index: 0 }))
        .await;
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    assert_eq!(fx.store.voting_snapshot().await.tallies, vec![0, 1]);
}

#[tokio::test]
async fn test_out_of_bounds_vote_dropped() {
    let fx = setup().await;
    fx.dispatcher
        .start_vote("q".into(), vec!["a".into(), "b".into()])
        .await
        .unwrap();
    fx.dispatcher
        .handle(event("alice", EventKind::VoteCast { option_index: 7 }))
        .await;
    assert_eq!(fx.store.voting_snapshot().await.tallies, vec![0, 0]);
}

#[tokio::test]
async fn test_late_subscriber_gets_snapshot_then_newer_deltas_only() {
    let fx = setup().await;

    fx.dispatcher.handle(superchat("alice", 5.0)).await;
    fx.dispatcher.handle(superchat("bob", 7.0)).await;

    let (mut rx, snapshot) = fx.broadcaster.subscribe(WidgetId::Monetization).await;
    let snap_version = snapshot.version();
    match snapshot {
        WidgetPush::Snapshot {
            state: WidgetSnapshot::Counter(c),
            ..
        } => assert_eq!(c.current_value, 12.0),
        other => panic!("expected counter snapshot, got {other:?}"),
    }

    fx.dispatcher.handle(superchat("carol", 1.0)).await;
    let delta = next_push(&mut rx).await;
    assert_eq!(delta.version(), snap_version + 1);
}

#[tokio::test]
async fn test_superchat_speech_carries_translation_target() {
    let fx = setup_with_tts(TtsConfig {
        translate_to: Some("EN-US".to_string()),
        ..TtsConfig::default()
    })
    .await;

    fx.dispatcher.handle(superchat("大哥", 30.0)).await;
    let request = timeout(Duration::from_secs(1), fx.queue.dequeue())
        .await
        .expect("no tts request enqueued");
    assert_eq!(request.translate_to.as_deref(), Some("EN-US"));

    // the membership thank-you is generated text, not viewer text
    fx.dispatcher
        .handle(event(
            "大哥",
            EventKind::Membership {
                tier: GuardTier::Captain,
                periods: 1,
                value: 138.0,
            },
        ))
        .await;
    let request = timeout(Duration::from_secs(1), fx.queue.dequeue())
        .await
        .expect("no tts request enqueued");
    assert_eq!(request.translate_to, None);
}

#[tokio::test]
async fn test_concurrent_reset_keeps_retained_snapshot_current() {
    let fx = setup().await;

    // apply and reset race; the retained snapshot must always match the
    // store once both commit
    for _ in 0..25 {
        let d1 = fx.dispatcher.clone();
        let d2 = fx.dispatcher.clone();
        let apply = tokio::spawn(async move { d1.handle(superchat("alice", 5.0)).await });
        let reset = tokio::spawn(async move {
            d2.reset_counter(WidgetId::Monetization).await.unwrap();
        });
        apply.await.unwrap();
        reset.await.unwrap();

        let store_value = fx
            .store
            .counter_snapshot(WidgetId::Monetization)
            .await
            .unwrap()
            .current_value;
        match fx.broadcaster.snapshot(WidgetId::Monetization).await {
            WidgetPush::Snapshot {
                state: WidgetSnapshot::Counter(c),
                ..
            } => assert_eq!(c.current_value, store_value),
            other => panic!("expected counter snapshot, got {other:?}"),
        }

        fx.dispatcher.reset_counter(WidgetId::Monetization).await.unwrap();
    }
}
