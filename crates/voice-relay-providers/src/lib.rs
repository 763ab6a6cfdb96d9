//! Dialogue provider abstraction.
//!
//! The relay sends one system persona plus one user transcript per request
//! and expects a single reply text back; providers implement
//! [`DialogueProvider`] for their chat-completions API.

use async_trait::async_trait;

use voice_relay_core::error::Result;

pub mod openai;

pub use openai::OpenAiDialogue;

/// The dialogue service seam: transcript in, reply text out.
#[async_trait]
pub trait DialogueProvider: Send + Sync {
    /// Produce a reply for `user_text` under the given persona/policy block.
    ///
    /// The persona is opaque data — it is passed through unmodified.
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String>;
}
