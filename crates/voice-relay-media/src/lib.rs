//! Media collaborators — local ffmpeg transcoding plus the remote
//! speech-to-text and text-to-speech clients.

pub mod stt;
pub mod transcode;
pub mod tts;

pub use stt::{SpeechToText, SttClient};
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use tts::{SpeechSynthesizer, TtsClient};
