use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use voice_relay_core::config::Config;
use voice_relay_gateway::{AppState, VoicePipeline, start_server};
use voice_relay_media::FfmpegTranscoder;

#[derive(Parser)]
#[command(
    name = "voice-relay",
    about = "Voice chat relay — audio in, transcribed, answered, and spoken back",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = "voice-relay.json5")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose common issues
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            // Missing credentials are fatal before we bind anything
            config.validate()?;
            tracing::info!("Starting voice-relay on port {}", config.server.port);

            let pipeline = Arc::new(VoicePipeline::from_config(&config)?);
            let state = Arc::new(AppState::new(Arc::new(config), pipeline)?);

            start_server(state).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
        },
        Commands::Doctor => {
            doctor(&config);
        }
    }

    Ok(())
}

fn doctor(config: &Config) {
    println!("voice-relay v{}", env!("CARGO_PKG_VERSION"));

    match FfmpegTranscoder::check_available(&config.transcoder) {
        Ok(()) => println!("transcoder: ffmpeg and ffprobe found"),
        Err(e) => println!("transcoder: {e}"),
    }

    let checks = [
        ("transcription key", config.transcription.resolve_api_key().is_some()),
        ("dialogue key", config.dialogue.resolve_api_key().is_some()),
        ("synthesis key", config.synthesis.resolve_api_key().is_some()),
    ];
    for (name, ok) in checks {
        println!("{name}: {}", if ok { "ok" } else { "missing" });
    }

    match config.dialogue.resolve_system_prompt() {
        Ok(persona) => println!("persona: {} chars", persona.len()),
        Err(e) => println!("persona: {e}"),
    }
}
