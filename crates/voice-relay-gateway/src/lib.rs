//! HTTP surface and the voice pipeline orchestrator.
//!
//! One endpoint drives one request end-to-end: normalize the uploaded clip,
//! probe its duration, transcribe it, generate a persona-bound reply, and
//! synthesize that reply to a downloadable audio file.

pub mod pipeline;
pub mod server;
pub mod state;

pub use pipeline::{VoicePipeline, VoiceReply};
pub use server::{app_router, start_server};
pub use state::AppState;
