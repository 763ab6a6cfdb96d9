//! Axum HTTP surface for the relay.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use voice_relay_core::error::{RelayError, Result};

use crate::pipeline::VoiceReply;
use crate::state::AppState;

/// Upload size cap for voice clips.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat-audio/", post(chat_audio))
        .route("/download-audio/{file}", get(download_audio))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn start_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.bind, state.config.server.port);
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("voice-relay listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Shutdown signal received");
}

async fn chat_audio(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    match handle_chat_audio(&state, multipart).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => {
            error!(%err, "Voice request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Processing failed", "details": err.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_chat_audio(state: &AppState, mut multipart: Multipart) -> Result<VoiceReply> {
    let mut audio: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::Upload(e.to_string()))?
    {
        if field.name() == Some("audio") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| RelayError::Upload(e.to_string()))?;
            audio = Some(bytes.to_vec());
        }
    }
    let audio = audio.ok_or_else(|| RelayError::Upload("missing 'audio' form field".into()))?;

    let upload_path = state.upload_dir.join(format!("upload_{}", Uuid::new_v4()));
    tokio::fs::write(&upload_path, &audio).await?;

    let reply = state.pipeline.process(&upload_path).await?;

    // The original input is only removed once the whole pipeline succeeded.
    if let Err(e) = tokio::fs::remove_file(&upload_path).await {
        warn!(path = %upload_path.display(), %e, "Failed to remove uploaded input");
    }

    Ok(reply)
}

async fn download_audio(State(state): State<Arc<AppState>>, Path(file): Path<String>) -> Response {
    // Output names never contain separators; anything that does is treated
    // as not found rather than resolved against the filesystem.
    if file.contains(['/', '\\']) || file.contains("..") {
        return not_found();
    }

    let path = state.output_dir.join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(_) => not_found(),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "File not found" })),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
