use anyhow::{bail, Result};
use audiocc::config;
use audiocc::{
    ArtistAlbumLayout, FfmpegTranscoder, FfprobeProber, LibraryError, Mp3Quality, Pipeline,
    Prober, Transcoder,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
#[clap(version, about = "Organize loose audio files into a tagged MP3 library")]
struct CliArgs {
    /// Directory to scan for audio files. Can also be specified in config file.
    #[clap(value_parser = parse_dir)]
    pub source: Option<PathBuf>,

    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Root of the organized library. Created if missing.
    #[clap(short, long, value_parser = parse_path)]
    pub library: Option<PathBuf>,

    /// MP3 quality of the produced files.
    #[clap(short, long, value_enum, default_value_t = Mp3Quality::V0)]
    pub quality: Mp3Quality,

    /// Re-encode in two steps for every file, not only those with a broken
    /// duration.
    #[clap(long)]
    pub fix: bool,

    /// Don't embed cover art in the produced files.
    #[clap(long)]
    pub no_cover: bool,

    /// Number of directories processed concurrently. Defaults to the number
    /// of CPU cores.
    #[clap(short, long)]
    pub jobs: Option<usize>,

    /// Path to the ffmpeg binary.
    #[clap(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary.
    #[clap(long)]
    pub ffprobe: Option<PathBuf>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            source: args.source.clone(),
            library: args.library.clone(),
            quality: args.quality,
            fix: args.fix,
            embed_cover: !args.no_cover,
            jobs: args.jobs,
            ffmpeg_path: args.ffmpeg.clone(),
            ffprobe_path: args.ffprobe.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  source: {:?}", app_config.source);
    info!("  library: {:?}", app_config.library);
    info!("  quality: {}", app_config.quality);
    info!("  fix: {}", app_config.fix);
    info!("  embed_cover: {}", app_config.embed_cover);
    info!("  jobs: {}", app_config.jobs);

    let cancel = CancellationToken::new();
    let prober = Arc::new(
        FfprobeProber::new(&app_config.ffprobe_path).with_cancellation(cancel.clone()),
    );
    let transcoder = Arc::new(
        FfmpegTranscoder::new(&app_config.ffmpeg_path).with_cancellation(cancel.clone()),
    );
    prober.check_available().await?;
    transcoder.check_available().await?;

    let pipeline = Pipeline::new(
        prober,
        transcoder,
        Arc::new(ArtistAlbumLayout::new(&app_config.library)),
        &app_config.library,
        app_config.pipeline_config(),
    )
    .with_cancellation(cancel.clone());

    // Ctrl+C stops scheduling, kills running tools and removes their output
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, stopping");
                cancel.cancel();
            }
        });
    }

    let result = pipeline.run(&app_config.source).await;

    let summary = match result {
        Ok(summary) => summary,
        Err(LibraryError::Canceled) => bail!("Canceled"),
        Err(e) => return Err(e.into()),
    };

    info!(
        "Done: {} bundles, {} placed, {} failed",
        summary.bundles,
        summary.placed.len(),
        summary.failures.len()
    );
    for placed in &summary.placed {
        info!("  {:?}", placed);
    }
    if !summary.is_success() {
        for (dir, e) in &summary.failures {
            warn!("  {:?}: {}", dir, e);
        }
        error!("{} bundles failed", summary.failures.len());
        std::process::exit(1);
    }

    Ok(())
}
