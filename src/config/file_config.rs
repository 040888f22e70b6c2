use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub source: Option<String>,
    pub library: Option<String>,
    /// "copy", "320" or "v0"
    pub quality: Option<String>,
    pub fix: Option<bool>,
    pub embed_cover: Option<bool>,
    pub jobs: Option<usize>,

    pub tools: Option<ToolsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
