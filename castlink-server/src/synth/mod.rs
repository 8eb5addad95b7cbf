//! Speech synthesis engines
//!
//! A single object-safe trait covers every backend: text in, audio bytes
//! out. The [`EngineSelector`] owns the active engine; the TTS worker binds
//! each request to whichever engine is active when the request is dequeued,
//! so switching never disturbs an in-flight synthesis.

pub mod cloud;
pub mod local;

pub use cloud::HttpEngine;
pub use local::LocalProcessEngine;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use castlink_common::config::{CloudEngineConfig, LocalEngineConfig, TtsConfig};

use crate::error::Result;

/// Per-request synthesis parameters
#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub voice: String,
    pub speed: f64,
    /// Target language to translate into before speaking; engines without
    /// translation support speak the text as-is
    pub translate_to: Option<String>,
}

impl SynthOptions {
    pub fn from_config(tts: &TtsConfig) -> Self {
        Self {
            voice: tts.voice.clone(),
            speed: tts.speed,
            translate_to: None,
        }
    }
}

/// A text-to-speech backend
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synthesize `text` to audio bytes in a container the configured
    /// player understands
    async fn synthesize(&self, text: &str, options: &SynthOptions) -> Result<Vec<u8>>;
}

/// Holder of the active synthesis engine
///
/// Engines live for the process lifetime; the selector only swaps which one
/// is current. Callers clone the `Arc` out and keep using it even if the
/// selection changes underneath them.
pub struct EngineSelector {
    active: RwLock<Arc<dyn SynthesisEngine>>,
}

impl EngineSelector {
    pub fn new(engine: Arc<dyn SynthesisEngine>) -> Self {
        Self {
            active: RwLock::new(engine),
        }
    }

    /// Build the engine named by `[tts].engine`. A cloud selection without
    /// a configured endpoint falls back to the local engine.
    pub fn from_config(
        tts: &TtsConfig,
        local: &LocalEngineConfig,
        cloud: &CloudEngineConfig,
    ) -> Self {
        let engine: Arc<dyn SynthesisEngine> = match tts.engine.as_str() {
            "cloud" => match &cloud.endpoint {
                Some(endpoint) => {
                    Arc::new(HttpEngine::new(endpoint.clone(), cloud.api_key.clone()))
                }
                None => {
                    warn!("cloud engine selected but no endpoint configured, using local engine");
                    Arc::new(LocalProcessEngine::new(
                        local.command.clone(),
                        local.args.clone(),
                    ))
                }
            },
            _ => Arc::new(LocalProcessEngine::new(
                local.command.clone(),
                local.args.clone(),
            )),
        };
        info!("synthesis engine: {}", engine.name());
        Self::new(engine)
    }

    pub async fn current(&self) -> Arc<dyn SynthesisEngine> {
        self.active.read().await.clone()
    }

    pub async fn switch(&self, engine: Arc<dyn SynthesisEngine>) {
        info!("switching synthesis engine to {}", engine.name());
        *self.active.write().await = engine;
    }
}
