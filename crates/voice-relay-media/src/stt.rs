//! Speech-to-text over a remote Whisper-compatible API.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use voice_relay_core::config::TranscriptionConfig;
use voice_relay_core::error::{RelayError, Result};

/// Remote transcription service: normalized waveform in, plain text out.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, wav: &Path) -> Result<String>;
}

/// HTTP [`SpeechToText`] client for Fireworks or OpenAI-style endpoints.
pub struct SttClient {
    config: TranscriptionConfig,
    client: reqwest::Client,
}

impl SttClient {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

/// Transcription endpoint for the configured provider. Fireworks routes
/// turbo models to a dedicated host.
pub fn provider_url(config: &TranscriptionConfig) -> String {
    if let Some(base) = &config.base_url {
        return format!("{}/audio/transcriptions", base.trim_end_matches('/'));
    }
    match config.provider.as_str() {
        "openai" => "https://api.openai.com/v1/audio/transcriptions".to_string(),
        _ => {
            let host = if config.model.ends_with("turbo") {
                "audio-turbo"
            } else {
                "audio-prod"
            };
            format!("https://{host}.us-virginia-1.direct.fireworks.ai/v1/audio/transcriptions")
        }
    }
}

/// Fireworks expects the raw key; OpenAI-style endpoints take a bearer token.
pub fn auth_header(config: &TranscriptionConfig, api_key: &str) -> String {
    match config.provider.as_str() {
        "openai" => format!("Bearer {api_key}"),
        _ => api_key.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    // A missing text field is a valid (empty) transcript.
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SpeechToText for SttClient {
    async fn transcribe(&self, wav: &Path) -> Result<String> {
        let api_key = self.config.resolve_api_key().ok_or_else(|| {
            RelayError::Transcription("No transcription API key configured".into())
        })?;

        let wav_data = tokio::fs::read(wav).await.map_err(|e| {
            RelayError::Transcription(format!("cannot read waveform {}: {e}", wav.display()))
        })?;

        let url = provider_url(&self.config);
        debug!(%url, model = %self.config.model, wav_bytes = wav_data.len(), "Sending audio for transcription");

        let part = reqwest::multipart::Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| RelayError::Transcription(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .part("file", part);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", auth_header(&self.config, &api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Transcription(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Transcription(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let body: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Transcription(e.to_string()))?;

        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_url_fireworks_turbo_host() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.model, "whisper-v3-turbo");
        assert!(provider_url(&config).starts_with("https://audio-turbo."));

        let config = TranscriptionConfig {
            model: "whisper-v3".into(),
            ..TranscriptionConfig::default()
        };
        assert!(provider_url(&config).starts_with("https://audio-prod."));
    }

    #[test]
    fn test_provider_url_openai() {
        let config = TranscriptionConfig {
            provider: "openai".into(),
            ..TranscriptionConfig::default()
        };
        assert_eq!(
            provider_url(&config),
            "https://api.openai.com/v1/audio/transcriptions"
        );
    }

    #[test]
    fn test_provider_url_base_override() {
        let config = TranscriptionConfig {
            base_url: Some("http://127.0.0.1:9999/v1/".into()),
            ..TranscriptionConfig::default()
        };
        assert_eq!(
            provider_url(&config),
            "http://127.0.0.1:9999/v1/audio/transcriptions"
        );
    }

    #[test]
    fn test_auth_header_per_provider() {
        let fireworks = TranscriptionConfig::default();
        assert_eq!(auth_header(&fireworks, "fw-key"), "fw-key");

        let openai = TranscriptionConfig {
            provider: "openai".into(),
            ..TranscriptionConfig::default()
        };
        assert_eq!(auth_header(&openai, "sk-key"), "Bearer sk-key");
    }

    #[test]
    fn test_missing_text_field_is_empty_transcript() {
        let resp: TranscriptionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.text, "");

        let resp: TranscriptionResponse =
            serde_json::from_str(r#"{"text": "What services do you offer?"}"#).unwrap();
        assert_eq!(resp.text, "What services do you offer?");
    }
}
