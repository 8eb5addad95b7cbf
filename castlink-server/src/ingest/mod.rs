//! Event ingestion
//!
//! A [`RelaySource`] produces the raw chat-relay lines; the parser turns
//! each line into at most one normalized event. Malformed input is dropped
//! with a diagnostic and never surfaces as a pipeline error.

pub mod parser;
pub mod tail;

pub use tail::LogTailSource;

use async_trait::async_trait;
use tokio::sync::mpsc;

use castlink_common::model::NormalizedEvent;

use crate::error::Result;

/// Ordered, at-least-once stream of raw relay lines
///
/// Implementations push lines into the channel until the receiver closes
/// or the source ends. Ordering within one source is preserved; duplicate
/// delivery after a restart is allowed (the consumer tolerates replays).
#[async_trait]
pub trait RelaySource: Send {
    async fn run(&mut self, lines: mpsc::Sender<String>) -> Result<()>;
}

/// Bridge raw relay lines into normalized events. Runs until either
/// channel closes; lines that parse to nothing are dropped by the parser.
pub async fn run_parser(mut lines: mpsc::Receiver<String>, events: mpsc::Sender<NormalizedEvent>) {
    while let Some(line) = lines.recv().await {
        if let Some(event) = parser::parse_line(&line) {
            if events.send(event).await.is_err() {
                break;
            }
        }
    }
}
