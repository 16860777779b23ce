use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, VideoParams};

/// Encodes RGB frames into a stored video.
///
/// Ordering contract: `write` is called with frames in presentation order.
pub trait VideoSink: Send {
    /// Create the output at `locator`.
    fn open(&mut self, locator: &str, width: u32, height: u32, fps: f64) -> Result<()>;

    /// Append one frame.
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Finish the output. Safe to call on a sink that never opened.
    fn close(&mut self) -> Result<()>;

    /// Abandon the output after a failure; whatever was written is not a valid result.
    fn discard(&mut self) -> Result<()> {
        self.close()
    }
}

/// Sink that spawns the system `ffmpeg` and streams raw RGB frames to its stdin.
pub struct FfmpegSink {
    ffmpeg_path: PathBuf,
    params: VideoParams,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    out_path: Option<PathBuf>,
    size: Option<(u32, u32)>,
}

impl FfmpegSink {
    pub fn new<P: Into<PathBuf>>(ffmpeg_path: P, params: VideoParams) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            params,
            child: None,
            stdin: None,
            stderr_drain: None,
            out_path: None,
            size: None,
        }
    }

    fn join_stderr(&mut self) -> Vec<u8> {
        match self.stderr_drain.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => {
                    warn!("Failed to read ffmpeg stderr: {}", e);
                    Vec::new()
                }
                Err(_) => {
                    warn!("ffmpeg stderr drain thread panicked");
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }
}

impl VideoSink for FfmpegSink {
    fn open(&mut self, locator: &str, width: u32, height: u32, fps: f64) -> Result<()> {
        let unavailable = |reason: String| VideoError::SinkUnavailable {
            locator: locator.to_string(),
            reason,
        };

        if width == 0 || height == 0 {
            return Err(unavailable(format!("invalid frame size {}x{}", width, height)).into());
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(unavailable(format!("invalid frame rate {}", fps)).into());
        }

        let out_path = PathBuf::from(locator);
        ensure_parent_dir(&out_path).map_err(|e| unavailable(e.to_string()))?;

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel", "error",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &format!("{}x{}", width, height),
            "-r", &format!("{}", fps),
            "-i", "pipe:0",
            "-an",
        ]);

        // yuv420p needs even dimensions; pad by one pixel rather than fail
        if self.params.pixel_format == "yuv420p" && (width % 2 != 0 || height % 2 != 0) {
            cmd.args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"]);
        }

        cmd.args([
            "-c:v", &self.params.codec,
            "-pix_fmt", &self.params.pixel_format,
            "-crf", &self.params.crf().to_string(),
            "-movflags", "+faststart",
        ]);
        cmd.arg(&out_path);

        let mut child = cmd
            .spawn()
            .map_err(|e| unavailable(format!("failed to spawn ffmpeg (is it installed and on PATH?): {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable("failed to open ffmpeg stdin".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| unavailable("failed to open ffmpeg stderr".to_string()))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        info!("Opened sink {}: {}x{} @ {:.2} fps ({})", locator, width, height, fps, self.params.codec);

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.out_path = Some(out_path);
        self.size = Some((width, height));
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let (width, height) = self.size.ok_or(VideoError::NotOpen { what: "sink" })?;
        if frame.width() != width || frame.height() != height {
            return Err(VideoError::FrameSizeMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or(VideoError::NotOpen { what: "sink" })?;
        stdin.write_all(frame.as_rgb_bytes()).map_err(|e| VideoError::EncodingFailed {
            reason: format!("failed to write frame to ffmpeg stdin: {}", e),
        })?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        drop(self.stdin.take());
        self.size = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| VideoError::EncodingFailed {
            reason: format!("failed to wait for ffmpeg to finish: {}", e),
        })?;
        let stderr_bytes = self.join_stderr();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(VideoError::EncodingFailed {
                reason: format!("ffmpeg exited with status {}: {}", status, stderr.trim()),
            }
            .into());
        }

        if let Some(path) = &self.out_path {
            debug!("Encoder finished writing {}", path.display());
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        drop(self.stdin.take());
        self.size = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.join_stderr();

        if let Some(path) = self.out_path.take() {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove partial output {}: {}", path.display(), e);
                } else {
                    info!("Removed partial output {}", path.display());
                }
            }
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            let _ = self.discard();
        }
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Return `true` when `ffmpeg` can be invoked at `ffmpeg_path`.
pub fn is_ffmpeg_available<P: AsRef<Path>>(ffmpeg_path: P) -> bool {
    Command::new(ffmpeg_path.as_ref())
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    locator: Option<String>,
    size: Option<(u32, u32)>,
    fps: Option<f64>,
    frames: Vec<Frame>,
    closed: bool,
    discarded: bool,
    fail_open: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `open` always fails, for exercising the unavailable-output path
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Borrow the captured frames, in write order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }
}

impl VideoSink for InMemorySink {
    fn open(&mut self, locator: &str, width: u32, height: u32, fps: f64) -> Result<()> {
        if self.fail_open {
            return Err(VideoError::SinkUnavailable {
                locator: locator.to_string(),
                reason: "in-memory sink configured to fail".to_string(),
            }
            .into());
        }
        self.locator = Some(locator.to_string());
        self.size = Some((width, height));
        self.fps = Some(fps);
        self.frames.clear();
        self.closed = false;
        self.discarded = false;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let (width, height) = self.size.ok_or(VideoError::NotOpen { what: "sink" })?;
        if frame.width() != width || frame.height() != height {
            return Err(VideoError::FrameSizeMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }
            .into());
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.frames.clear();
        self.discarded = true;
        self.closed = true;
        Ok(())
    }
}
