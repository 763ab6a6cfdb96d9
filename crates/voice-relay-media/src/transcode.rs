//! Audio normalization and duration probing via ffmpeg/ffprobe.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use voice_relay_core::config::TranscoderConfig;
use voice_relay_core::error::{RelayError, Result};

/// Local media converter: normalizes input audio and reports clip duration.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Normalize arbitrary input audio into the fixed mono/16kHz waveform.
    async fn normalize(&self, input: &Path, output: &Path) -> Result<()>;

    /// Duration of a normalized waveform, in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;
}

/// [`Transcoder`] backed by the ffmpeg and ffprobe binaries.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Check that the configured ffmpeg and ffprobe binaries are runnable.
    pub fn check_available(config: &TranscoderConfig) -> Result<()> {
        for bin in [&config.ffmpeg_path, &config.ffprobe_path] {
            std::process::Command::new(bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map_err(|e| RelayError::Transcode(format!("{bin} not runnable: {e}")))?;
        }
        Ok(())
    }
}

/// ffmpeg argument list for fixed-format normalization.
fn normalize_args(input: &Path, output: &Path, config: &TranscoderConfig) -> Vec<String> {
    vec![
        "-i".into(),
        input.display().to_string(),
        "-ac".into(),
        config.channels.to_string(),
        "-ar".into(),
        config.sample_rate.to_string(),
        "-y".into(),
        output.display().to_string(),
    ]
}

/// ffprobe argument list: bare duration in seconds on stdout.
fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.display().to_string(),
    ]
}

fn parse_duration(stdout: &str) -> Result<f64> {
    let trimmed = stdout.trim();
    let duration: f64 = trimmed
        .parse()
        .map_err(|_| RelayError::Probe(format!("unparseable ffprobe duration: {trimmed:?}")))?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(RelayError::Probe(format!("invalid duration: {duration}")));
    }
    Ok(duration)
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<()> {
        debug!(
            input = %input.display(),
            output = %output.display(),
            sample_rate = self.config.sample_rate,
            channels = self.config.channels,
            "Normalizing audio"
        );

        let out = Command::new(&self.config.ffmpeg_path)
            .args(normalize_args(input, output, &self.config))
            .output()
            .await
            .map_err(|e| {
                RelayError::Transcode(format!("failed to run {}: {e}", self.config.ffmpeg_path))
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(RelayError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let out = Command::new(&self.config.ffprobe_path)
            .args(probe_args(path))
            .output()
            .await
            .map_err(|e| {
                RelayError::Probe(format!("failed to run {}: {e}", self.config.ffprobe_path))
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(RelayError::Probe(format!(
                "ffprobe exited with {}: {}",
                out.status,
                stderr.trim()
            )));
        }

        parse_duration(&String::from_utf8_lossy(&out.stdout))
    }
}
