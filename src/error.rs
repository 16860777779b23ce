use thiserror::Error;

/// Main error type for the green screen compositor
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Chroma key error: {0}")]
    Chroma(#[from] ChromaError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Video source/sink errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Video source unavailable: {locator} ({reason})")]
    SourceUnavailable { locator: String, reason: String },

    #[error("Video sink unavailable: {locator} ({reason})")]
    SinkUnavailable { locator: String, reason: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Frame size mismatch: got {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Video {what} used before it was opened")]
    NotOpen { what: &'static str },
}

/// User image resolution errors
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to fetch image {index} from {locator}: {reason}")]
    ImageFetchFailed {
        index: u32,
        locator: String,
        reason: String,
    },
}

/// Chroma key parameter errors
#[derive(Error, Debug)]
pub enum ChromaError {
    #[error("Invalid {channel} range: lower bound {min} exceeds upper bound {max}")]
    InvalidRange { channel: &'static str, min: u8, max: u8 },

    #[error("Edge feather must be non-negative, got {value}")]
    NegativeFeather { value: i32 },

    #[error("Spill removal strength must be within [0, 1], got {value}")]
    InvalidSpillStrength { value: f32 },
}

/// Request and job-level errors
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Invalid composite request: {details}")]
    InvalidRequest { details: String },

    #[error("Compositing stopped after {frames_processed} frames")]
    Cancelled { frames_processed: u64 },

    #[error("Compositing worker failed: {reason}")]
    WorkerFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error aborts a compositing job.
    ///
    /// Every error value is fatal for the job that produced it; region-level
    /// problems are reported as skips and never surface as errors. Cancellation
    /// is the one exit that was asked for rather than suffered.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Composition(CompositionError::Cancelled { .. }))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::SourceUnavailable { locator, .. }) => {
                format!("Could not open base video '{}'. Please check the file exists and ffmpeg is installed.", locator)
            }
            Self::Video(VideoError::SinkUnavailable { locator, .. }) => {
                format!("Could not create output video '{}'. Please check the directory is writable.", locator)
            }
            Self::Image(ImageError::ImageFetchFailed { index, locator, .. }) => {
                format!("Could not load user image {} from '{}'.", index, locator)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
