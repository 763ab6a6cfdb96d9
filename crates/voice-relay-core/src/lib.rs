//! Core types, config, and errors for voice-relay.

pub mod config;
pub mod error;

pub use error::{RelayError, Result};
