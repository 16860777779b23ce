use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, VideoInfo};

/// Decodes a stored video into RGB frames in presentation order.
pub trait VideoSource: Send {
    /// Open the video behind `locator` and report its stream properties.
    fn open(&mut self, locator: &str) -> Result<VideoInfo>;

    /// Read the next frame, or `None` once the stream is exhausted.
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Release the decoder. Safe to call more than once, and on a source that never opened.
    fn close(&mut self) -> Result<()>;
}

/// Source that decodes through the system `ffmpeg`, probing metadata with `ffprobe`.
pub struct FfmpegSource {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,

    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    info: Option<VideoInfo>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

impl FfmpegSource {
    pub fn new<P: Into<PathBuf>>(ffmpeg_path: P, ffprobe_path: P) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            child: None,
            stdout: None,
            stderr_drain: None,
            info: None,
        }
    }

    fn probe(&self, locator: &str) -> Result<VideoInfo> {
        let unavailable = |reason: String| VideoError::SourceUnavailable {
            locator: locator.to_string(),
            reason,
        };

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration",
                "-of", "json",
                locator,
            ])
            .output()
            .map_err(|e| unavailable(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!("ffprobe failed: {}", stderr.trim())).into());
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| unavailable(format!("invalid ffprobe output: {}", e)))?;
        let stream = probe
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| unavailable("no video stream".to_string()))?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(unavailable("video stream has no dimensions".to_string()).into()),
        };

        let fps = stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
            .ok_or_else(|| unavailable("video stream has no frame rate".to_string()))?;

        let frame_count = stream
            .nb_frames
            .as_deref()
            .and_then(|n| n.parse::<u64>().ok())
            .or_else(|| {
                let duration = stream.duration.as_deref()?.parse::<f64>().ok()?;
                Some((duration * fps).round() as u64)
            })
            .unwrap_or_else(|| {
                warn!("Frame count unknown for {}, progress will not show totals", locator);
                0
            });

        Ok(VideoInfo {
            width,
            height,
            fps,
            frame_count,
        })
    }
}

impl VideoSource for FfmpegSource {
    fn open(&mut self, locator: &str) -> Result<VideoInfo> {
        let info = self.probe(locator)?;

        let mut child = Command::new(&self.ffmpeg_path)
            .args(decode_args(locator))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VideoError::SourceUnavailable {
                locator: locator.to_string(),
                reason: format!("failed to spawn ffmpeg (is it installed and on PATH?): {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::SourceUnavailable {
            locator: locator.to_string(),
            reason: "failed to open ffmpeg stdout".to_string(),
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| VideoError::SourceUnavailable {
            locator: locator.to_string(),
            reason: "failed to open ffmpeg stderr".to_string(),
        })?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        info!(
            "Opened source {}: {}x{} @ {:.2} fps, ~{} frames",
            locator, info.width, info.height, info.fps, info.frame_count
        );

        self.child = Some(child);
        self.stdout = Some(stdout);
        self.stderr_drain = Some(stderr_drain);
        self.info = Some(info);
        Ok(info)
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let info = self.info.ok_or(VideoError::NotOpen { what: "source" })?;
        let stdout = self
            .stdout
            .as_mut()
            .ok_or(VideoError::NotOpen { what: "source" })?;

        let mut buffer = vec![0u8; info.frame_bytes()];
        let filled = read_full(stdout, &mut buffer).map_err(|e| VideoError::DecodingFailed {
            reason: format!("failed to read frame from ffmpeg: {}", e),
        })?;

        if filled == 0 {
            return Ok(None);
        }
        if filled < buffer.len() {
            return Err(VideoError::DecodingFailed {
                reason: format!("truncated frame: {} of {} bytes", filled, buffer.len()),
            }
            .into());
        }

        Frame::from_rgb_bytes(info.width, info.height, buffer)
            .map(Some)
            .ok_or_else(|| {
                VideoError::DecodingFailed {
                    reason: "frame buffer does not match stream dimensions".to_string(),
                }
                .into()
            })
    }

    fn close(&mut self) -> Result<()> {
        drop(self.stdout.take());
        self.info = None;

        if let Some(mut child) = self.child.take() {
            // The decoder may still be running if we stopped early
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            child.wait()?;
        }

        if let Some(handle) = self.stderr_drain.take() {
            match handle.join() {
                Ok(Ok(bytes)) if !bytes.is_empty() => {
                    debug!("ffmpeg decoder stderr: {}", String::from_utf8_lossy(&bytes).trim());
                }
                Ok(_) => {}
                Err(_) => warn!("ffmpeg stderr drain thread panicked"),
            }
        }
        Ok(())
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Arguments for decoding `locator` to packed RGB on stdout.
///
/// Autorotation is disabled so decoded frames keep the coded size reported
/// in the stream metadata.
fn decode_args(locator: &str) -> Vec<&str> {
    vec![
        "-v", "error",
        "-nostdin",
        "-noautorotate",
        "-i", locator,
        "-map", "0:v:0",
        "-f", "rawvideo",
        "-pix_fmt", "rgb24",
        "pipe:1",
    ]
}

/// Parse ffprobe rates such as `30/1` or `30000/1001`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Read until `buf` is full or the stream ends; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// In-memory source for tests and synthetic input.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    locator: String,
    frames: Vec<Frame>,
    width: u32,
    height: u32,
    fps: f64,
    cursor: Option<usize>,
    closed: bool,
}

impl InMemorySource {
    /// Create a source that answers to `locator` with the given frames.
    ///
    /// Dimensions are taken from the first frame; an empty source reports 0x0.
    pub fn new<S: Into<String>>(locator: S, frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        Self {
            locator: locator.into(),
            frames,
            width,
            height,
            fps,
            cursor: None,
            closed: false,
        }
    }

    /// Whether `close` has been called since the last `open`
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of frames handed out so far
    pub fn frames_read(&self) -> usize {
        self.cursor.unwrap_or(0)
    }
}

impl VideoSource for InMemorySource {
    fn open(&mut self, locator: &str) -> Result<VideoInfo> {
        if locator != self.locator {
            return Err(VideoError::SourceUnavailable {
                locator: locator.to_string(),
                reason: "no such in-memory video".to_string(),
            }
            .into());
        }
        self.cursor = Some(0);
        self.closed = false;
        Ok(VideoInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count: self.frames.len() as u64,
        })
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let cursor = self.cursor.as_mut().ok_or(VideoError::NotOpen { what: "source" })?;
        let frame = self.frames.get(*cursor).cloned();
        if frame.is_some() {
            *cursor += 1;
        }
        Ok(frame)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
