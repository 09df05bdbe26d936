use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use speak_recorder::audio::{AudioBackendConfig, MicrophoneBackend};
use speak_recorder::{
    create_router, AppState, Config, ControlEvent, HttpUploader, RecorderController,
    TerminalNavigator, TerminalView,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "speak-recorder")]
#[command(about = "Record voice in chunks and submit them to an upload endpoint")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, global = true, default_value = "config/speak-recorder")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record from the microphone; press Enter to start and again to stop
    Record {
        /// Endpoint chunks are POSTed to
        #[arg(long)]
        upload_url: Option<String>,

        /// Where to send the user after submitting
        #[arg(long)]
        next_url: Option<String>,

        /// Chunk duration in seconds
        #[arg(long)]
        chunk_secs: Option<u64>,

        /// Stop automatically after this many seconds
        #[arg(long)]
        max_secs: Option<u64>,

        /// Input device name
        #[arg(long)]
        device: Option<String>,
    },
    /// Run the upload receiver
    Serve {
        #[arg(long)]
        bind: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Record {
            upload_url,
            next_url,
            chunk_secs,
            max_secs,
            device,
        } => {
            let mut recorder = cfg.recorder_config();
            if let Some(next_url) = next_url {
                recorder.next_url = next_url;
            }
            if let Some(secs) = chunk_secs {
                anyhow::ensure!(secs > 0, "--chunk-secs must be at least 1");
                recorder.chunk_duration = Duration::from_secs(secs);
            }
            if let Some(secs) = max_secs {
                anyhow::ensure!(secs > 0, "--max-secs must be at least 1");
                recorder.max_duration = Some(Duration::from_secs(secs));
            }

            let upload_url = upload_url.unwrap_or_else(|| cfg.recorder.upload_url.clone());
            let device = device.or_else(|| cfg.recorder.device.clone());

            info!("Upload endpoint: {}", upload_url);
            info!("Next page: {}", recorder.next_url);
            info!("Chunk duration: {}s", recorder.chunk_duration.as_secs());

            let backend = MicrophoneBackend::new(
                AudioBackendConfig {
                    target_sample_rate: recorder.sample_rate,
                    target_channels: recorder.channels,
                    ..AudioBackendConfig::default()
                },
                device,
            );
            let uploader = HttpUploader::new(upload_url).context("Failed to create HTTP client")?;

            let mut controller = RecorderController::new(
                recorder,
                Box::new(backend),
                Arc::new(uploader),
                Box::new(TerminalView::default()),
                Box::new(TerminalNavigator::default()),
            );

            if let Err(e) = controller.preview().await {
                warn!("Meter preview unavailable: {}", e);
            }

            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(_)) => {
                            if tx.send(ControlEvent::Activate).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Failed to read from stdin: {}", e);
                            break;
                        }
                    }
                }
            });

            let stats = controller.run(rx).await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Serve { bind, port } => {
            let bind = bind.unwrap_or_else(|| cfg.service.http.bind.clone());
            let port = port.unwrap_or(cfg.service.http.port);
            let root = cfg.storage.root();

            info!("Storing uploads in {}", root.display());

            let app = create_router(AppState::new(root));
            let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
                .await
                .with_context(|| format!("Failed to bind {}:{}", bind, port))?;

            info!("Listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }

        Command::Devices => {
            let devices = MicrophoneBackend::list_devices()?;
            if devices.is_empty() {
                println!("No input devices found");
            }
            for device in devices {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("{}{}", device.name, marker);
            }
        }
    }

    Ok(())
}
