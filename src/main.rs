use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use greenscreen_compositor::{
    composition::{CompositeRequest, CompositionEngine},
    config::Config,
    video::sink::is_ffmpeg_available,
};

#[derive(Parser)]
#[command(
    name = "greenscreen-compositor",
    version,
    about = "Replace green screen regions in a video with still images",
    long_about = "Greenscreen-Compositor keys the green areas of a base video and fills them, frame by frame, with user-supplied images placed in normalized regions over given frame ranges."
)]
struct Cli {
    /// Composite request (JSON)
    #[arg(short, long)]
    request: PathBuf,

    /// Output video file path (defaults to a timestamped file in output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Greenscreen-Compositor v{}", env!("CARGO_PKG_VERSION"));
    info!("Request: {:?}", cli.request);

    let config = match cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    if !is_ffmpeg_available(&config.video.ffmpeg_path) {
        warn!("ffmpeg not found at {:?}; decoding and encoding will fail", config.video.ffmpeg_path);
    }

    let request = CompositeRequest::from_file(&cli.request)
        .with_context(|| format!("reading request {}", cli.request.display()))?;

    let engine = CompositionEngine::new(config)?;
    let result = match engine.composite(request, cli.output).await {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e.user_message());
            return Err(e.into());
        }
    };

    info!("Composition complete! Output saved to: {}", result.output_video_path);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
