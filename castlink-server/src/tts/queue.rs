//! Ordered TTS request queue
//!
//! Owned exclusively by the queue manager; the worker is the only consumer.
//! Two orderings: strict arrival FIFO, or per-sender round-robin fairness
//! where each sender keeps their own FIFO and senders take turns. Autoplay
//! off parks the consumer without losing queued requests. An optional cap
//! drops the oldest request when a new one arrives.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use castlink_common::events::{NowPlaying, TtsSnapshot};
use castlink_common::model::TtsRequest;

pub struct TtsQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

struct Inner {
    policy: Policy,
    autoplay: bool,
    cap: Option<usize>,
    queued: usize,
    next_seq: u64,
    now_playing: Option<NowPlaying>,
}

struct Entry {
    seq: u64,
    request: TtsRequest,
}

enum Policy {
    Fifo(VecDeque<Entry>),
    Fair {
        by_sender: HashMap<String, VecDeque<Entry>>,
        /// Senders with pending requests, in turn order
        rotation: VecDeque<String>,
    },
}

impl Policy {
    fn push(&mut self, entry: Entry) {
        match self {
            Policy::Fifo(order) => order.push_back(entry),
            Policy::Fair { by_sender, rotation } => {
                let sender = entry.request.sender_id.clone();
                let queue = by_sender.entry(sender.clone()).or_default();
                if queue.is_empty() {
                    rotation.push_back(sender);
                }
                queue.push_back(entry);
            }
        }
    }

    fn pop(&mut self) -> Option<Entry> {
        match self {
            Policy::Fifo(order) => order.pop_front(),
            Policy::Fair { by_sender, rotation } => {
                let sender = rotation.pop_front()?;
                let queue = by_sender.get_mut(&sender)?;
                let entry = queue.pop_front()?;
                if queue.is_empty() {
                    by_sender.remove(&sender);
                } else {
                    rotation.push_back(sender);
                }
                Some(entry)
            }
        }
    }

    /// Remove the request with the lowest arrival seq (for the cap)
    fn drop_oldest(&mut self) -> Option<Entry> {
        match self {
            Policy::Fifo(order) => order.pop_front(),
            Policy::Fair { by_sender, rotation } => {
                let sender = by_sender
                    .iter()
                    .filter_map(|(s, q)| q.front().map(|e| (e.seq, s.clone())))
                    .min_by_key(|(seq, _)| *seq)
                    .map(|(_, s)| s)?;
                let queue = by_sender.get_mut(&sender)?;
                let entry = queue.pop_front()?;
                if queue.is_empty() {
                    by_sender.remove(&sender);
                    rotation.retain(|s| *s != sender);
                }
                Some(entry)
            }
        }
    }

    fn clear(&mut self) {
        match self {
            Policy::Fifo(order) => order.clear(),
            Policy::Fair { by_sender, rotation } => {
                by_sender.clear();
                rotation.clear();
            }
        }
    }
}

impl TtsQueue {
    pub fn new(fairness: bool, cap: Option<usize>, autoplay: bool) -> Self {
        let policy = if fairness {
            Policy::Fair {
                by_sender: HashMap::new(),
                rotation: VecDeque::new(),
            }
        } else {
            Policy::Fifo(VecDeque::new())
        };
        Self {
            inner: Mutex::new(Inner {
                policy,
                autoplay,
                cap,
                queued: 0,
                next_seq: 0,
                now_playing: None,
            }),
            notify: Notify::new(),
        }
    }

    /// Add a request. At the cap, the oldest queued request is dropped to
    /// make room. Returns the post-enqueue snapshot.
    pub async fn enqueue(&self, request: TtsRequest) -> TtsSnapshot {
        let mut inner = self.inner.lock().await;
        if let Some(cap) = inner.cap {
            if inner.queued >= cap {
                if let Some(dropped) = inner.policy.drop_oldest() {
                    inner.queued -= 1;
                    debug!("queue at cap {cap}, dropped request {}", dropped.request.id);
                }
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.policy.push(Entry { seq, request });
        inner.queued += 1;
        drop(inner);

        self.notify.notify_one();
        self.snapshot().await
    }

    /// Wait for the next request: blocks while autoplay is off or the queue
    /// is empty
    pub async fn dequeue(&self) -> TtsRequest {
        loop {
            // arm before checking so a concurrent enqueue cannot be missed
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if inner.autoplay {
                    if let Some(entry) = inner.policy.pop() {
                        inner.queued -= 1;
                        return entry.request;
                    }
                }
            }
            notified.await;
        }
    }

    /// Mark a request as the one being synthesized/played
    pub async fn begin(&self, request: &TtsRequest) -> TtsSnapshot {
        let mut inner = self.inner.lock().await;
        inner.now_playing = Some(NowPlaying {
            request_id: request.id,
            sender_id: request.sender_id.clone(),
            text: request.text.clone(),
        });
        Self::snapshot_of(&inner)
    }

    /// Clear the now-playing marker after completion or failure
    pub async fn finish(&self) -> TtsSnapshot {
        let mut inner = self.inner.lock().await;
        inner.now_playing = None;
        Self::snapshot_of(&inner)
    }

    pub async fn set_autoplay(&self, enabled: bool) -> TtsSnapshot {
        let mut inner = self.inner.lock().await;
        inner.autoplay = enabled;
        let snapshot = Self::snapshot_of(&inner);
        drop(inner);
        info!("tts autoplay {}", if enabled { "on" } else { "off" });
        if enabled {
            self.notify.notify_one();
        }
        snapshot
    }

    /// Drop every queued request (the in-flight one is unaffected)
    pub async fn clear(&self) -> TtsSnapshot {
        let mut inner = self.inner.lock().await;
        inner.policy.clear();
        inner.queued = 0;
        Self::snapshot_of(&inner)
    }

    pub async fn snapshot(&self) -> TtsSnapshot {
        Self::snapshot_of(&*self.inner.lock().await)
    }

    fn snapshot_of(inner: &Inner) -> TtsSnapshot {
        TtsSnapshot {
            autoplay: inner.autoplay,
            queued: inner.queued,
            now_playing: inner.now_playing.clone(),
        }
    }
}
