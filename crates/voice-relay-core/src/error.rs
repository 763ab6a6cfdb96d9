use thiserror::Error;

/// Error taxonomy for the relay. Each pipeline stage has its own variant;
/// the HTTP layer collapses all of them into one opaque failure response.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Dialogue error: {0}")]
    Dialogue(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
