//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Built-in persona/policy payload, used when the config provides neither an
/// inline prompt nor a prompt file. Opaque data — the relay never parses it.
pub const DEFAULT_PERSONA: &str = include_str!("../assets/default_persona.txt");

/// Top-level voice-relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub transcoder: TranscoderConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// Local media-conversion settings (ffmpeg/ffprobe).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Target sample rate for the normalized waveform.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Target channel count for the normalized waveform.
    #[serde(default = "default_channels")]
    pub channels: u32,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}

fn default_ffprobe_path() -> String {
    "ffprobe".into()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u32 {
    1
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

/// Speech-to-text provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Provider: "fireworks" or "openai" (default: "fireworks").
    #[serde(default = "default_transcription_provider")]
    pub provider: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_transcription_key_env")]
    pub api_key_env: Option<String>,

    /// Model name (e.g. "whisper-v3-turbo").
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Explicit API base URL; overrides provider selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_transcription_provider() -> String {
    "fireworks".into()
}

fn default_transcription_key_env() -> Option<String> {
    Some("FIREWORKS_API_KEY".into())
}

fn default_transcription_model() -> String {
    "whisper-v3-turbo".into()
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: default_transcription_provider(),
            api_key: None,
            api_key_env: default_transcription_key_env(),
            model: default_transcription_model(),
            base_url: None,
        }
    }
}

impl TranscriptionConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Dialogue (chat completions) provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_dialogue_key_env")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_dialogue_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Inline persona/policy text. Takes priority over `system_prompt_path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Path to a persona/policy text file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<String>,
}

fn default_dialogue_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".into())
}

fn default_dialogue_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_dialogue_key_env(),
            model: default_dialogue_model(),
            temperature: default_temperature(),
            base_url: None,
            system_prompt: None,
            system_prompt_path: None,
        }
    }
}

impl DialogueConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }

    /// Resolve the persona/policy payload: inline text first, then the prompt
    /// file, then the built-in default.
    pub fn resolve_system_prompt(&self) -> Result<String> {
        if let Some(inline) = &self.system_prompt {
            if !inline.trim().is_empty() {
                return Ok(inline.clone());
            }
        }
        if let Some(path) = &self.system_prompt_path {
            let text = std::fs::read_to_string(path).map_err(|e| {
                RelayError::Config(format!("Cannot read system prompt file {path}: {e}"))
            })?;
            return Ok(text);
        }
        Ok(DEFAULT_PERSONA.to_string())
    }
}

/// Text-to-speech provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_synthesis_key_env")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_synthesis_model")]
    pub model: String,

    /// Voice ID (default: "shimmer").
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Playback speed multiplier.
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Style instructions sent alongside the text.
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Output encoding (default: "mp3").
    #[serde(default = "default_response_format")]
    pub response_format: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_synthesis_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".into())
}

fn default_synthesis_model() -> String {
    "gpt-4o-mini-tts".into()
}

fn default_voice() -> String {
    "shimmer".into()
}

fn default_speed() -> f64 {
    0.85
}

fn default_instructions() -> String {
    "Speak slowly, warmly, and politely, like a caring human assistant. \
     Use a gentle, encouraging, emotionally present tone. Pause naturally. \
     Imagine you're talking to someone who's waiting for something important."
        .into()
}

fn default_response_format() -> String {
    "mp3".into()
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_synthesis_key_env(),
            model: default_synthesis_model(),
            voice: default_voice(),
            speed: default_speed(),
            instructions: default_instructions(),
            response_format: default_response_format(),
            base_url: None,
        }
    }
}

impl SynthesisConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Local storage directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where raw uploads are staged.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Where per-request normalized waveforms live.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Where synthesized reply audio is written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            work_dir: default_work_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment
/// variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(RelayError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config =
            json5::from_str(&substituted).map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Startup validation: both remote provider credentials must resolve,
    /// and a configured prompt file must be readable.
    pub fn validate(&self) -> Result<()> {
        if self.transcription.resolve_api_key().is_none() {
            return Err(RelayError::Config(
                "missing transcription API key (set transcription.api_key or FIREWORKS_API_KEY)"
                    .into(),
            ));
        }
        if self.dialogue.resolve_api_key().is_none() {
            return Err(RelayError::Config(
                "missing dialogue API key (set dialogue.api_key or OPENAI_API_KEY)".into(),
            ));
        }
        if self.synthesis.resolve_api_key().is_none() {
            return Err(RelayError::Config(
                "missing synthesis API key (set synthesis.api_key or OPENAI_API_KEY)".into(),
            ));
        }
        self.dialogue.resolve_system_prompt()?;
        Ok(())
    }
}
