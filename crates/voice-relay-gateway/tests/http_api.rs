//! HTTP API tests — start a real server with mock collaborators and talk to
//! it over the wire.
//!
//! Run with: `cargo test -p voice-relay-gateway --test http_api`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use voice_relay_core::config::Config;
use voice_relay_core::error::{RelayError, Result};
use voice_relay_gateway::{AppState, VoicePipeline, app_router};
use voice_relay_media::{SpeechSynthesizer, SpeechToText, Transcoder};
use voice_relay_providers::DialogueProvider;

/// Copies the input as the "normalized waveform" so the transcript mirrors
/// the uploaded bytes and per-request isolation is observable end to end.
struct CopyTranscoder;

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<()> {
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn probe_duration(&self, _path: &Path) -> Result<f64> {
        Ok(3.2)
    }
}

/// Reads the staged waveform back as text, after a delay long enough that
/// concurrent requests overlap inside the pipeline.
struct SlowEchoStt;

#[async_trait]
impl SpeechToText for SlowEchoStt {
    async fn transcribe(&self, wav: &Path) -> Result<String> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let bytes = tokio::fs::read(wav).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

struct EchoDialogue;

#[async_trait]
impl DialogueProvider for EchoDialogue {
    async fn complete(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
        Ok(format!("echo: {user_text}"))
    }
}

struct FailingDialogue;

#[async_trait]
impl DialogueProvider for FailingDialogue {
    async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
        Err(RelayError::Dialogue(
            "dialogue service returned no completions".into(),
        ))
    }
}

struct TextTts;

#[async_trait]
impl SpeechSynthesizer for TextTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

struct TestServer {
    base: String,
    dirs: tempfile::TempDir,
}

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.upload_dir = root.join("uploads");
    config.storage.work_dir = root.join("work");
    config.storage.output_dir = root.join("outputs");
    config
}

async fn start_test_server(dialogue: Arc<dyn DialogueProvider>) -> TestServer {
    let dirs = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(dirs.path()));

    let pipeline = Arc::new(VoicePipeline::new(
        Arc::new(CopyTranscoder),
        Arc::new(SlowEchoStt),
        dialogue,
        Arc::new(TextTts),
        "test persona".into(),
        config.storage.work_dir.clone(),
        config.storage.output_dir.clone(),
    ));

    let state = Arc::new(AppState::new(config, pipeline).unwrap());
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base: format!("http://{addr}"),
        dirs,
    }
}

fn audio_form(payload: &'static str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().part(
        "audio",
        reqwest::multipart::Part::bytes(payload.as_bytes())
            .file_name("hello_test.mp3")
            .mime_str("audio/mpeg")
            .unwrap(),
    )
}

#[tokio::test]
async fn test_chat_audio_happy_path() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat-audio/", server.base))
        .multipart(audio_form("What services do you offer?"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["duration_seconds"], 3.2);
    assert_eq!(body["transcript"], "What services do you offer?");
    assert_eq!(body["reply"], "echo: What services do you offer?");

    let name = body["audio_reply"].as_str().unwrap();
    assert!(name.starts_with("assistant_response_"));
    assert!(name.ends_with(".mp3"));

    // The reply audio is downloadable under the returned name
    let download = client
        .get(format!("{}/download-audio/{name}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), 200);
    assert_eq!(
        download.headers()["content-type"].to_str().unwrap(),
        "audio/mpeg"
    );
    let audio = download.bytes().await.unwrap();
    assert_eq!(&audio[..], b"echo: What services do you offer?");
}

#[tokio::test]
async fn test_pipeline_failure_is_opaque_500() {
    let server = start_test_server(Arc::new(FailingDialogue)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat-audio/", server.base))
        .multipart(audio_form("hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Processing failed");
    assert!(
        body["details"].as_str().unwrap().contains("no completions"),
        "details should carry the underlying message: {body}"
    );
}

#[tokio::test]
async fn test_missing_audio_field_is_500() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("wrong_field", "data");
    let resp = client
        .post(format!("{}/chat-audio/", server.base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Processing failed");
}

#[tokio::test]
async fn test_download_unknown_file_is_404() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;

    let resp = reqwest::get(format!(
        "{}/download-audio/assistant_response_0.mp3",
        server.base
    ))
    .await
    .unwrap();

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "File not found");
}

#[tokio::test]
async fn test_download_rejects_traversal_names() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;

    let resp = reqwest::get(format!("{}/download-audio/..%2Fsecret", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_health() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;

    let resp = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

/// Regression test for the shared-waveform race: two overlapping requests
/// must each get reply audio derived from their own transcript.
#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_requests_stay_isolated() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;
    let client = reqwest::Client::new();

    let post = |payload: &'static str| {
        let client = client.clone();
        let url = format!("{}/chat-audio/", server.base);
        async move {
            client
                .post(url)
                .multipart(audio_form(payload))
                .send()
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap()
        }
    };

    // Stagger the starts slightly; the STT delay keeps the pipelines
    // overlapping through the normalize/probe/transcribe stages.
    let first = post("first caller speaking");
    let second = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        post("second caller speaking").await
    };
    let (a, b) = tokio::join!(first, second);

    assert_eq!(a["transcript"], "first caller speaking");
    assert_eq!(a["reply"], "echo: first caller speaking");
    assert_eq!(b["transcript"], "second caller speaking");
    assert_eq!(b["reply"], "echo: second caller speaking");

    let name_a = a["audio_reply"].as_str().unwrap();
    let name_b = b["audio_reply"].as_str().unwrap();
    assert_ne!(name_a, name_b);

    // Each caller downloads audio synthesized from their own reply
    for (name, expected) in [
        (name_a, "echo: first caller speaking"),
        (name_b, "echo: second caller speaking"),
    ] {
        let audio = reqwest::get(format!("{}/download-audio/{name}", server.base))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&audio[..], expected.as_bytes());
    }
}

/// Uploaded inputs are staged then removed after success; failed requests
/// leave their upload behind (no cleanup of failed intermediates).
#[tokio::test]
async fn test_upload_removed_after_success() {
    let server = start_test_server(Arc::new(EchoDialogue)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat-audio/", server.base))
        .multipart(audio_form("hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let uploads = server.dirs.path().join("uploads");
    let leftover = std::fs::read_dir(&uploads).unwrap().count();
    assert_eq!(leftover, 0);
}
