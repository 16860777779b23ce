use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::{
    composition::{
        pipeline::{CompositingPipeline, PipelineOptions, StopHandle},
        request::{CompositeRequest, CompositeResult},
    },
    config::Config,
    error::{CompositionError, Result},
    images::{DefaultImageResolver, ImageResolver},
    video::{FfmpegSink, FfmpegSource, VideoSink, VideoSource},
};

/// Long-lived compositing service.
///
/// Owns the configuration and the image resolver, and runs each job's
/// blocking pipeline on tokio's blocking pool. One engine can serve many
/// jobs; [`shutdown`](Self::shutdown) stops running jobs between frames
/// and refuses new ones.
pub struct CompositionEngine {
    config: Config,
    resolver: Arc<dyn ImageResolver>,
    stop: StopHandle,
}

impl CompositionEngine {
    /// Create an engine with the default image resolver
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let resolver = DefaultImageResolver::new(
            Duration::from_secs(config.images.http_timeout_secs),
            config.images.max_image_bytes,
        );
        debug!(
            "Engine ready: batch size {}, {} worker threads",
            config.pipeline.batch_size, config.pipeline.worker_threads
        );
        Ok(Self {
            config,
            resolver: Arc::new(resolver),
            stop: StopHandle::new(),
        })
    }

    /// Replace the image resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn ImageResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Composite `request` into `output`, or into a timestamped file under
    /// the configured output directory when `output` is `None`.
    pub async fn composite(&self, request: CompositeRequest, output: Option<PathBuf>) -> Result<CompositeResult> {
        let output = output.unwrap_or_else(|| self.default_output_path());
        let video = self.config.video.clone();

        let source = FfmpegSource::new(video.ffmpeg_path.clone(), video.ffprobe_path);
        let sink = FfmpegSink::new(video.ffmpeg_path, video.params);
        self.composite_with(request, source, sink, output.display().to_string()).await
    }

    /// Composite with caller-supplied video endpoints.
    pub async fn composite_with<S, K>(
        &self,
        request: CompositeRequest,
        mut source: S,
        mut sink: K,
        output_locator: String,
    ) -> Result<CompositeResult>
    where
        S: VideoSource + 'static,
        K: VideoSink + 'static,
    {
        if self.stop.is_stopped() {
            return Err(CompositionError::Cancelled { frames_processed: 0 }.into());
        }

        info!("Compositing {} -> {}", request.base_video_path, output_locator);
        info!(
            "   Regions: {}, user images: {}",
            request.green_screen_regions.len(),
            request.user_images.len()
        );

        let resolver = Arc::clone(&self.resolver);
        let defaults = self.config.chroma.clone();
        let options = PipelineOptions::from(&self.config.pipeline);
        let stop = self.stop.clone();

        tokio::task::spawn_blocking(move || {
            CompositingPipeline::new(&mut source, &mut sink, resolver.as_ref())
                .with_options(options)
                .with_stop_handle(stop)
                .run(&request, &defaults, &output_locator)
        })
        .await
        .map_err(|e| CompositionError::WorkerFailed { reason: e.to_string() })?
    }

    /// Stop running jobs at their next frame and refuse new ones
    pub fn shutdown(&self) {
        info!("Shutting down composition engine");
        self.stop.stop();
    }

    pub fn is_shut_down(&self) -> bool {
        self.stop.is_stopped()
    }

    /// `<output_dir>/composite_<timestamp>.mp4`
    pub fn default_output_path(&self) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        self.config.output_dir.join(format!("composite_{}.mp4", stamp))
    }
}
