//! Cloud HTTP synthesis engine
//!
//! Posts the text to a vendor endpoint and expects audio bytes back. The
//! request body is the minimal common shape `{text, voice, speed}`; vendor
//! specifics beyond that stay in the endpoint configuration.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::synth::{SynthOptions, SynthesisEngine};

pub struct HttpEngine {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    translate_to: Option<&'a str>,
}

impl HttpEngine {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            endpoint,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SynthesisEngine for HttpEngine {
    fn name(&self) -> &'static str {
        "cloud-http"
    }

    async fn synthesize(&self, text: &str, options: &SynthOptions) -> Result<Vec<u8>> {
        debug!("posting {} chars to {}", text.chars().count(), self.endpoint);

        let mut request = self.client.post(&self.endpoint).json(&SynthesisRequest {
            text,
            voice: &options.voice,
            speed: options.speed,
            translate_to: options.translate_to.as_deref(),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("cloud request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Synthesis(format!("cloud engine rejected request: {e}")))?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("cloud response read failed: {e}")))?;

        if audio.is_empty() {
            return Err(Error::Synthesis("cloud engine returned no audio".to_string()));
        }
        Ok(audio.to_vec())
    }
}
