//! OpenAI-compatible Chat Completions dialogue provider (non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use voice_relay_core::config::DialogueConfig;
use voice_relay_core::error::{RelayError, Result};

use crate::DialogueProvider;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiDialogue {
    base_url: String,
    config: DialogueConfig,
    client: reqwest::Client,
}

impl OpenAiDialogue {
    pub fn new(config: DialogueConfig) -> Self {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            base_url,
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// --- request/response types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

fn build_messages(system_prompt: &str, user_text: &str) -> Vec<serde_json::Value> {
    vec![
        json!({ "role": "system", "content": system_prompt }),
        json!({ "role": "user", "content": user_text }),
    ]
}

/// First choice's message content, trimmed. An empty choices list is a
/// dialogue failure, never a null reply.
fn extract_reply(response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::Dialogue("dialogue service returned no completions".into()))?;
    Ok(choice.message.content.trim().to_string())
}

#[async_trait]
impl DialogueProvider for OpenAiDialogue {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String> {
        let api_key = self
            .config
            .resolve_api_key()
            .ok_or_else(|| RelayError::Dialogue("No dialogue API key configured".into()))?;

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: build_messages(system_prompt, user_text),
            temperature: self.config.temperature,
        };

        debug!(model = %body.model, base_url = %self.base_url, "Requesting chat completion");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Dialogue(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Dialogue(format!(
                "dialogue API error {status}: {body}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Dialogue(e.to_string()))?;

        extract_reply(parsed)
    }
}
