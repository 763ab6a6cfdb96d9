//! Shared server state.

use std::path::PathBuf;
use std::sync::Arc;

use voice_relay_core::config::Config;
use voice_relay_core::error::Result;

use crate::pipeline::VoicePipeline;

/// State shared by all request handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<VoicePipeline>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl AppState {
    /// Build the state and create the storage directories it relies on.
    pub fn new(config: Arc<Config>, pipeline: Arc<VoicePipeline>) -> Result<Self> {
        let upload_dir = config.storage.upload_dir.clone();
        let output_dir = config.storage.output_dir.clone();
        std::fs::create_dir_all(&upload_dir)?;
        std::fs::create_dir_all(&config.storage.work_dir)?;
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            config,
            pipeline,
            upload_dir,
            output_dir,
        })
    }
}
