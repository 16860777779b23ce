use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    chroma::ChromaSettings,
    error::{ConfigError, Result},
    video::VideoParams,
};

/// Main configuration for the green screen compositor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for outputs when the caller does not name a file
    pub output_dir: PathBuf,

    /// Chroma key settings used when a request carries none
    pub chroma: ChromaSettings,

    /// Video decode/encode settings
    pub video: VideoConfig,

    /// Frame loop settings
    pub pipeline: PipelineConfig,

    /// User image fetching
    pub images: ImageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            chroma: ChromaSettings::default(),
            video: VideoConfig::default(),
            pipeline: PipelineConfig::default(),
            images: ImageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.chroma.validate()?;
        self.video.validate()?;
        self.pipeline.validate()?;
        self.images.validate()?;
        Ok(())
    }
}

/// Video decode/encode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// ffmpeg executable used for decoding and encoding
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable used to read stream metadata
    pub ffprobe_path: PathBuf,

    /// Output encoding parameters
    pub params: VideoParams,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            params: VideoParams::default(),
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.params.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "video.params.quality".to_string(),
                value: self.params.quality.to_string()
            }.into());
        }

        if self.params.codec.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "video.params.codec".to_string(),
                value: self.params.codec.clone()
            }.into());
        }

        Ok(())
    }
}

/// Frame loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Log progress every this many frames
    pub progress_interval: u64,

    /// Frames composited concurrently per batch (1 = strictly sequential)
    pub batch_size: usize,

    /// Worker threads for batch compositing
    pub worker_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            batch_size: 1,
            worker_threads: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.progress_interval".to_string(),
                value: self.progress_interval.to_string()
            }.into());
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.batch_size".to_string(),
                value: self.batch_size.to_string()
            }.into());
        }

        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.worker_threads".to_string(),
                value: self.worker_threads.to_string()
            }.into());
        }

        Ok(())
    }
}

/// User image fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Per-request timeout for remote images (seconds)
    pub http_timeout_secs: u64,

    /// Largest accepted encoded image (bytes)
    pub max_image_bytes: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            max_image_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ImageConfig {
    fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "images.http_timeout_secs".to_string(),
                value: self.http_timeout_secs.to_string()
            }.into());
        }

        if self.max_image_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "images.max_image_bytes".to_string(),
                value: self.max_image_bytes.to_string()
            }.into());
        }

        Ok(())
    }
}
