//! Local subprocess synthesis engine
//!
//! Spawns a synthesizer command per request, writes the text to its stdin
//! and collects audio from its stdout. `{voice}` and `{speed}` placeholders
//! in the configured arguments are substituted per request.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::synth::{SynthOptions, SynthesisEngine};

pub struct LocalProcessEngine {
    command: String,
    args: Vec<String>,
}

impl LocalProcessEngine {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self { command, args }
    }

    fn expand_args(&self, options: &SynthOptions) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{voice}", &options.voice)
                    .replace("{speed}", &options.speed.to_string())
            })
            .collect()
    }
}

#[async_trait]
impl SynthesisEngine for LocalProcessEngine {
    fn name(&self) -> &'static str {
        "local-process"
    }

    async fn synthesize(&self, text: &str, options: &SynthOptions) -> Result<Vec<u8>> {
        let args = self.expand_args(options);
        debug!("spawning {} {:?}", self.command, args);

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Synthesis(format!("failed to spawn {}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| Error::Synthesis(format!("failed to write text: {e}")))?;
            // close stdin so the synthesizer sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Synthesis(format!("synthesizer failed: {e}")))?;

        if !output.status.success() {
            return Err(Error::Synthesis(format!(
                "{} exited with {}",
                self.command, output.status
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Synthesis("synthesizer produced no audio".to_string()));
        }
        Ok(output.stdout)
    }
}
