//! The voice pipeline — normalize, probe, transcribe, reply, synthesize.
//!
//! Strictly sequential: each stage consumes the previous stage's output and
//! the first failure aborts the request without invoking later stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use voice_relay_core::config::Config;
use voice_relay_core::error::Result;
use voice_relay_media::{
    FfmpegTranscoder, SpeechSynthesizer, SpeechToText, SttClient, Transcoder, TtsClient,
};
use voice_relay_providers::{DialogueProvider, OpenAiDialogue};

/// Response payload for one processed voice request.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceReply {
    /// File name of the synthesized reply, servable via `/download-audio/`.
    pub audio_reply: String,
    /// Duration of the caller's clip, in seconds.
    pub duration_seconds: f64,
    pub transcript: String,
    pub reply: String,
}

/// Per-request staging file for the normalized waveform.
///
/// Every request gets its own UUID-derived path so concurrent requests can
/// never read each other's waveform. The file is removed when the guard
/// drops, on success and on failure alike.
struct StagedWav {
    path: PathBuf,
}

impl StagedWav {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedWav {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), %e, "Failed to remove staged waveform");
            }
        }
    }
}

/// Drives one voice request end-to-end against the four collaborators.
pub struct VoicePipeline {
    transcoder: Arc<dyn Transcoder>,
    stt: Arc<dyn SpeechToText>,
    dialogue: Arc<dyn DialogueProvider>,
    tts: Arc<dyn SpeechSynthesizer>,
    system_prompt: String,
    work_dir: PathBuf,
    output_dir: PathBuf,
}

impl VoicePipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        stt: Arc<dyn SpeechToText>,
        dialogue: Arc<dyn DialogueProvider>,
        tts: Arc<dyn SpeechSynthesizer>,
        system_prompt: String,
        work_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            transcoder,
            stt,
            dialogue,
            tts,
            system_prompt,
            work_dir,
            output_dir,
        }
    }

    /// Wire the production collaborators from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let system_prompt = config.dialogue.resolve_system_prompt()?;
        Ok(Self::new(
            Arc::new(FfmpegTranscoder::new(config.transcoder.clone())),
            Arc::new(SttClient::new(config.transcription.clone())),
            Arc::new(OpenAiDialogue::new(config.dialogue.clone())),
            Arc::new(TtsClient::new(config.synthesis.clone())),
            system_prompt,
            config.storage.work_dir.clone(),
            config.storage.output_dir.clone(),
        ))
    }

    /// Process one uploaded clip into a reply.
    ///
    /// The caller owns the input file; it is not touched here beyond reading.
    pub async fn process(&self, input: &Path) -> Result<VoiceReply> {
        let staged = StagedWav::new(
            self.work_dir
                .join(format!("normalized_{}.wav", Uuid::new_v4())),
        );

        self.transcoder.normalize(input, staged.path()).await?;
        let duration_seconds = self.transcoder.probe_duration(staged.path()).await?;

        // An empty transcript is a valid result, never an error.
        let transcript = self.stt.transcribe(staged.path()).await?;
        debug!(duration_seconds, transcript_len = transcript.len(), "Transcription complete");

        let reply = self
            .dialogue
            .complete(&self.system_prompt, &transcript)
            .await?;

        let audio = self.tts.synthesize(&reply).await?;

        let audio_reply = format!("assistant_response_{}.mp3", Utc::now().timestamp_micros());
        tokio::fs::write(self.output_dir.join(&audio_reply), &audio).await?;

        info!(%audio_reply, duration_seconds, "Voice request processed");

        Ok(VoiceReply {
            audio_reply,
            duration_seconds,
            transcript,
            reply,
        })
    }
}
