// Writes the refined alpha mask of a still frame, for tuning chroma ranges

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use greenscreen_compositor::{
    chroma::{ColorMasker, MaskRefiner},
    config::Config,
    video::Frame,
};

#[derive(Parser)]
#[command(
    name = "chroma-preview",
    version,
    about = "Render the chroma key alpha mask of an image as a grayscale PNG"
)]
struct Cli {
    /// Input image (a frame grab of the base video)
    #[arg(short, long)]
    input: PathBuf,

    /// Output PNG path
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file whose [chroma] section is used (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let settings = config.chroma;
    settings.validate()?;

    let image = image::open(&cli.input)
        .with_context(|| format!("opening {}", cli.input.display()))?
        .to_rgb8();
    let frame = Frame::from(image);
    info!("Loaded {}x{} frame from {:?}", frame.width(), frame.height(), cli.input);

    let mask = ColorMasker::mask(&frame, &settings);
    let alpha = MaskRefiner::refine(&mask, settings.edge_feather)?;

    let keyed = mask.pixels().filter(|p| p.0[0] > 0).count();
    let total = (frame.width() as usize * frame.height() as usize).max(1);
    info!(
        "Keyed {} of {} pixels ({:.1}%), feather radius {}",
        keyed,
        total,
        keyed as f64 * 100.0 / total as f64,
        settings.edge_feather
    );

    alpha
        .to_gray()
        .save(&cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!("Alpha mask saved to {:?}", cli.output);
    Ok(())
}
