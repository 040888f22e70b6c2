mod file_config;

pub use file_config::{FileConfig, ToolsConfig};

use crate::pipeline::PipelineConfig;
use crate::transcode::Mp3Quality;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub source: Option<PathBuf>,
    pub library: Option<PathBuf>,
    pub quality: Mp3Quality,
    pub fix: bool,
    pub embed_cover: bool,
    pub jobs: Option<usize>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            source: None,
            library: None,
            quality: Mp3Quality::default(),
            fix: false,
            embed_cover: true,
            jobs: None,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: PathBuf,
    pub library: PathBuf,
    pub quality: Mp3Quality,
    pub fix: bool,
    pub embed_cover: bool,
    pub jobs: usize,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let source = file
            .source
            .map(PathBuf::from)
            .or_else(|| cli.source.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("source must be specified on the command line or in config file")
            })?;

        if !source.exists() {
            bail!("Source directory does not exist: {:?}", source);
        }
        if !source.is_dir() {
            bail!("source is not a directory: {:?}", source);
        }

        let library = file
            .library
            .map(PathBuf::from)
            .or_else(|| cli.library.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("library must be specified via --library or in config file")
            })?;

        if library.exists() && !library.is_dir() {
            bail!("library is not a directory: {:?}", library);
        }

        let source_abs = resolve_existing_prefix(&source)?;
        let library_abs = resolve_existing_prefix(&library)?;
        if library_abs.starts_with(&source_abs) || source_abs.starts_with(&library_abs) {
            bail!(
                "library {:?} and source {:?} must not contain each other",
                library,
                source
            );
        }

        let quality = file
            .quality
            .as_deref()
            .map(Mp3Quality::from_tag)
            .unwrap_or(cli.quality);
        let fix = file.fix.unwrap_or(cli.fix);
        let embed_cover = file.embed_cover.unwrap_or(cli.embed_cover);

        let jobs = file
            .jobs
            .or(cli.jobs)
            .unwrap_or_else(default_jobs);
        if jobs == 0 {
            bail!("jobs must be at least 1");
        }

        let tools = file.tools.unwrap_or_default();
        let ffmpeg_path = tools
            .ffmpeg_path
            .map(PathBuf::from)
            .or_else(|| cli.ffmpeg_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let ffprobe_path = tools
            .ffprobe_path
            .map(PathBuf::from)
            .or_else(|| cli.ffprobe_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffprobe"));

        Ok(Self {
            source,
            library,
            quality,
            fix,
            embed_cover,
            jobs,
            ffmpeg_path,
            ffprobe_path,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            quality: self.quality,
            fix: self.fix,
            embed_cover: self.embed_cover,
            jobs: self.jobs,
        }
    }
}

/// Absolute `path` with symlinks resolved in the part that exists.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };

    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {:?}", path))?;
    for name in missing.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
