//! Audio playback sink
//!
//! Playback is serialized by the worker; a sink only needs to play one
//! buffer at a time. The default sink pipes the audio bytes to an external
//! player command's stdin and waits for it to exit.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play a complete audio buffer to the output device, returning when
    /// playback ends
    async fn play(&self, audio: &[u8]) -> Result<()>;
}

/// Pipes audio to a configured player command (`ffplay ... -` style)
pub struct CommandSink {
    command: String,
    args: Vec<String>,
}

impl CommandSink {
    /// `command` is the full player invocation; the first element is the
    /// program, the rest its arguments.
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("empty player command".to_string()))?;
        Ok(Self {
            command: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl AudioSink for CommandSink {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        debug!("playing {} bytes via {}", audio.len(), self.command);

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Playback(format!("failed to spawn {}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(audio)
                .await
                .map_err(|e| Error::Playback(format!("failed to write audio: {e}")))?;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Playback(format!("player failed: {e}")))?;
        if !status.success() {
            return Err(Error::Playback(format!(
                "{} exited with {status}",
                self.command
            )));
        }
        Ok(())
    }
}
