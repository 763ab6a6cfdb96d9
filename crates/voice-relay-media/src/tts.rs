//! Text-to-speech over a remote speech API. One request, one binary body.

use async_trait::async_trait;
use tracing::debug;

use voice_relay_core::config::SynthesisConfig;
use voice_relay_core::error::{RelayError, Result};

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Remote speech synthesis: reply text in, encoded audio bytes out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// HTTP [`SpeechSynthesizer`] client for the OpenAI speech endpoint.
pub struct TtsClient {
    config: SynthesisConfig,
    client: reqwest::Client,
}

impl TtsClient {
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

pub fn speech_url(config: &SynthesisConfig) -> String {
    match &config.base_url {
        Some(base) => format!("{}/audio/speech", base.trim_end_matches('/')),
        None => OPENAI_SPEECH_URL.to_string(),
    }
}

fn build_request(text: &str, config: &SynthesisConfig) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "voice": config.voice,
        "input": text,
        "instructions": config.instructions,
        "response_format": config.response_format,
        "speed": config.speed,
    })
}

#[async_trait]
impl SpeechSynthesizer for TtsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| RelayError::Synthesis("No synthesis API key configured".into()))?;

        let url = speech_url(&self.config);
        debug!(%url, voice = %self.config.voice, text_len = text.len(), "Synthesizing speech");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&build_request(text, &self.config))
            .send()
            .await
            .map_err(|e| RelayError::Synthesis(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Synthesis(format!(
                "TTS API error {status}: {body}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RelayError::Synthesis(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}
