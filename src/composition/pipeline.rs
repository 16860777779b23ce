use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::chroma::ChromaSettings;
use crate::composition::frame::{FrameCompositor, FrameReport, PreparedRegions, SkipReason};
use crate::composition::request::{CompositeRequest, CompositeResult};
use crate::config::PipelineConfig;
use crate::error::{CompositionError, CompositorError, Result, VideoError};
use crate::images::{ImageResolver, ImageSet};
use crate::video::{Frame, VideoInfo, VideoSink, VideoSource};

/// Where a compositing job is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opening,
    LoadingImages,
    Processing,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::LoadingImages => "loading-images",
            Self::Processing => "processing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Asks a running pipeline to stop before its next frame.
///
/// Clones share the same flag, so a handle can be moved to another thread
/// while the pipeline runs.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Tuning knobs for the frame loop
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Report progress every this many frames
    pub progress_interval: u64,
    /// Frames composited concurrently before being written in order
    pub batch_size: usize,
    /// Threads in the batch worker pool
    pub worker_threads: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            batch_size: 1,
            worker_threads: 1,
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            progress_interval: config.progress_interval,
            batch_size: config.batch_size,
            worker_threads: config.worker_threads,
        }
    }
}

/// Snapshot handed to the progress callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub frames_processed: u64,
    /// As reported by the source; 0 when unknown
    pub total_frames: u64,
    pub elapsed: Duration,
}

impl Progress {
    /// Completion in [0, 1], if the total is known
    pub fn fraction(&self) -> Option<f64> {
        (self.total_frames > 0).then(|| (self.frames_processed as f64 / self.total_frames as f64).min(1.0))
    }
}

type ProgressCallback<'a> = Box<dyn FnMut(&Progress) + Send + 'a>;

/// Drives one compositing job from base video to output video.
///
/// Frames are read, composited and written in presentation order. With a
/// batch size above one, a batch of frames is composited on a worker pool and
/// the results are written back in read order. The source and sink are always
/// released before [`run`](Self::run) returns; on failure the sink output is
/// discarded.
pub struct CompositingPipeline<'a> {
    source: &'a mut dyn VideoSource,
    sink: &'a mut dyn VideoSink,
    resolver: &'a dyn ImageResolver,
    options: PipelineOptions,
    stop: StopHandle,
    progress: Option<ProgressCallback<'a>>,
    state: PipelineState,
    source_open: bool,
    sink_open: bool,
}

impl<'a> CompositingPipeline<'a> {
    pub fn new(
        source: &'a mut dyn VideoSource,
        sink: &'a mut dyn VideoSink,
        resolver: &'a dyn ImageResolver,
    ) -> Self {
        Self {
            source,
            sink,
            resolver,
            options: PipelineOptions::default(),
            stop: StopHandle::new(),
            progress: None,
            state: PipelineState::Idle,
            source_open: false,
            sink_open: false,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an externally held stop flag
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Called every `progress_interval` frames and once at the end
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Progress) + Send + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the whole job.
    ///
    /// `defaults` are used when the request carries no chroma settings.
    /// `output_locator` is where the sink writes the composited video.
    pub fn run(
        &mut self,
        request: &CompositeRequest,
        defaults: &ChromaSettings,
        output_locator: &str,
    ) -> Result<CompositeResult> {
        if self.state != PipelineState::Idle {
            return Err(CompositorError::generic(format!(
                "pipeline already ran (state: {})",
                self.state
            )));
        }

        let started = Instant::now();
        let outcome = self.execute(request, defaults, output_locator, started);

        self.transition(PipelineState::Finalizing);
        let released = self.finalize(outcome.is_ok());

        match (outcome, released) {
            (Ok(mut result), Ok(())) => {
                result.processing_time_secs = started.elapsed().as_secs_f64();
                self.transition(PipelineState::Done);

                let fps = if result.processing_time_secs > 0.0 {
                    result.frame_count as f64 / result.processing_time_secs
                } else {
                    0.0
                };
                info!(
                    "Composited {} frames in {:.2}s ({:.1} fps), {} region skips -> {}",
                    result.frame_count, result.processing_time_secs, fps, result.regions_skipped, result.output_video_path
                );
                Ok(result)
            }
            (Ok(_), Err(e)) | (Err(e), _) => {
                self.transition(PipelineState::Failed);
                if e.is_fatal() {
                    warn!("Compositing job failed: {}", e);
                } else {
                    info!("Compositing job stopped: {}", e);
                }
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        request: &CompositeRequest,
        defaults: &ChromaSettings,
        output_locator: &str,
        started: Instant,
    ) -> Result<CompositeResult> {
        request.validate()?;
        let settings = request.chroma_settings.as_ref().unwrap_or(defaults);

        self.transition(PipelineState::Opening);
        let info = self.source.open(&request.base_video_path)?;
        self.source_open = true;
        if info.width == 0 || info.height == 0 {
            return Err(VideoError::SourceUnavailable {
                locator: request.base_video_path.clone(),
                reason: "video stream has no dimensions".to_string(),
            }
            .into());
        }
        info!(
            "Opened {}: {}x{} @ {:.2} fps, {} frames",
            request.base_video_path, info.width, info.height, info.fps, info.frame_count
        );

        self.transition(PipelineState::LoadingImages);
        let images = self.load_images(request)?;

        self.transition(PipelineState::Processing);
        self.sink.open(output_locator, info.width, info.height, info.fps)?;
        self.sink_open = true;

        let prepared = FrameCompositor::prepare(&request.green_screen_regions, &images, info.width, info.height);
        log_static_skips(&prepared);

        let (frame_count, regions_skipped) = self.process_frames(&info, &prepared, settings, started)?;

        Ok(CompositeResult {
            output_video_path: output_locator.to_string(),
            frame_count,
            processing_time_secs: 0.0,
            regions_skipped,
        })
    }

    /// Fetch every user image. Any single failure aborts the job.
    fn load_images(&self, request: &CompositeRequest) -> Result<ImageSet> {
        let mut images = ImageSet::with_capacity(request.user_images.len());
        for user_image in &request.user_images {
            let image = self.resolver.resolve(user_image.index, &user_image.url)?;
            debug!(
                "Loaded image {} from {} ({}x{})",
                user_image.index, user_image.url, image.width(), image.height()
            );
            if images.insert(user_image.index, image).is_some() {
                warn!("Image index {} given more than once; using {}", user_image.index, user_image.url);
            }
        }
        info!("Loaded {} user images", images.len());

        for index in request.unresolved_indices() {
            warn!("No user image for region index {}; those regions will be skipped", index);
        }
        Ok(images)
    }

    fn process_frames(
        &mut self,
        info: &VideoInfo,
        prepared: &PreparedRegions<'_>,
        settings: &ChromaSettings,
        started: Instant,
    ) -> Result<(u64, u64)> {
        let batch_size = self.options.batch_size.max(1);
        let interval = self.options.progress_interval.max(1);
        let pool = if batch_size > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.worker_threads.max(1))
                .build()
                .map_err(|e| CompositionError::WorkerFailed { reason: e.to_string() })?;
            Some(pool)
        } else {
            None
        };

        let mut frame_index = 0u64;
        let mut regions_skipped = 0u64;
        let mut batch = Vec::with_capacity(batch_size);

        loop {
            if self.stop.is_stopped() {
                return Err(CompositionError::Cancelled { frames_processed: frame_index }.into());
            }

            batch.clear();
            while batch.len() < batch_size {
                match self.source.read_next()? {
                    Some(frame) => {
                        check_frame_size(&frame, info)?;
                        batch.push(frame);
                    }
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }

            let first = frame_index;
            let results: Vec<Result<(Frame, FrameReport)>> = match &pool {
                Some(pool) => pool.install(|| {
                    batch
                        .par_iter()
                        .enumerate()
                        .map(|(i, frame)| FrameCompositor::composite_prepared(frame, first + i as u64, prepared, settings))
                        .collect()
                }),
                None => batch
                    .iter()
                    .enumerate()
                    .map(|(i, frame)| FrameCompositor::composite_prepared(frame, first + i as u64, prepared, settings))
                    .collect(),
            };

            for result in results {
                let (output, report) = result?;
                regions_skipped += report.skipped.len() as u64;
                self.sink.write(&output)?;
                frame_index += 1;

                if frame_index % interval == 0 {
                    self.report_progress(frame_index, info.frame_count, started);
                }
            }
        }

        if frame_index % interval != 0 {
            self.report_progress(frame_index, info.frame_count, started);
        }
        Ok((frame_index, regions_skipped))
    }

    fn report_progress(&mut self, frames_processed: u64, total_frames: u64, started: Instant) {
        let progress = Progress {
            frames_processed,
            total_frames,
            elapsed: started.elapsed(),
        };
        match progress.fraction() {
            Some(fraction) => info!(
                "Processed {}/{} frames ({:.1}%)",
                frames_processed,
                total_frames,
                fraction * 100.0
            ),
            None => info!("Processed {} frames", frames_processed),
        }
        if let Some(callback) = self.progress.as_mut() {
            callback(&progress);
        }
    }

    /// Release the source and sink. On failure the sink output is discarded.
    fn finalize(&mut self, succeeded: bool) -> Result<()> {
        let mut first_error = None;

        if self.sink_open {
            self.sink_open = false;
            let released = if succeeded { self.sink.close() } else { self.sink.discard() };
            if let Err(e) = released {
                warn!("Failed to release video sink: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if self.source_open {
            self.source_open = false;
            if let Err(e) = self.source.close() {
                warn!("Failed to close video source: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) if succeeded => Err(e),
            _ => Ok(()),
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
    }
}

fn check_frame_size(frame: &Frame, info: &VideoInfo) -> Result<()> {
    if frame.width() != info.width || frame.height() != info.height {
        return Err(VideoError::FrameSizeMismatch {
            expected_width: info.width,
            expected_height: info.height,
            actual_width: frame.width(),
            actual_height: frame.height(),
        }
        .into());
    }
    Ok(())
}

/// Log regions that can never be composited, once per region
fn log_static_skips(prepared: &PreparedRegions<'_>) {
    let mut seen = HashSet::new();
    for entry in prepared.iter() {
        match entry.skip_reason() {
            Some(SkipReason::MissingImage) => {
                // Already warned per index while loading images
                if seen.insert(entry.region.index) {
                    debug!(
                        "Region {} (frames {}-{}) has no image",
                        entry.region.index, entry.region.start_frame, entry.region.end_frame
                    );
                }
            }
            Some(reason) => debug!(
                "Region {} (frames {}-{}) will be skipped: {:?}",
                entry.region.index, entry.region.start_frame, entry.region.end_frame, reason
            ),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::request::UserImage;
    use crate::images::StaticImageResolver;
    use crate::region::{FitMode, GreenScreenRegion, NormalizedRect};
    use crate::video::{InMemorySink, InMemorySource};
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    const GREEN: [u8; 3] = [0, 255, 0];
    const RED: [u8; 3] = [255, 0, 0];

    fn settings() -> ChromaSettings {
        ChromaSettings {
            edge_feather: 0,
            spill_removal: 0.0,
            ..ChromaSettings::default()
        }
    }

    fn request(regions: Vec<GreenScreenRegion>, images: Vec<UserImage>) -> CompositeRequest {
        CompositeRequest {
            base_video_path: "base.mp4".to_string(),
            user_images: images,
            green_screen_regions: regions,
            chroma_settings: Some(settings()),
        }
    }

    fn full_region(index: u32, start: u64, end: u64) -> GreenScreenRegion {
        GreenScreenRegion {
            index,
            start_frame: start,
            end_frame: end,
            position: NormalizedRect::full(),
            fit_mode: FitMode::Fill,
        }
    }

    fn image(url: &str, index: u32) -> UserImage {
        UserImage {
            url: url.to_string(),
            index,
        }
    }

    fn green_frames(count: usize) -> Vec<Frame> {
        (0..count).map(|_| Frame::new_filled(10, 10, GREEN)).collect()
    }

    fn red_resolver() -> StaticImageResolver {
        StaticImageResolver::new().with_image("red.png", RgbImage::from_pixel(2, 2, Rgb(RED)))
    }

    #[test]
    fn test_green_video_becomes_image() {
        let mut source = InMemorySource::new("base.mp4", green_frames(3), 25.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![full_region(0, 0, 2)], vec![image("red.png", 0)]);

        let mut pipeline = CompositingPipeline::new(&mut source, &mut sink, &resolver);
        let result = pipeline.run(&req, &ChromaSettings::default(), "out.mp4").unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);
        drop(pipeline);

        assert_eq!(result.frame_count, 3);
        assert_eq!(result.output_video_path, "out.mp4");
        assert_eq!(result.regions_skipped, 0);
        assert_eq!(sink.frames().len(), 3);
        for frame in sink.frames() {
            assert!(frame.as_image().pixels().all(|p| p.0 == RED));
        }
        assert!(sink.is_closed());
        assert!(!sink.is_discarded());
        assert_eq!(sink.fps(), Some(25.0));
        assert!(source.is_closed());
    }

    #[test]
    fn test_no_regions_copies_video() {
        let mut frames = green_frames(4);
        frames[2].set_pixel(3, 3, [12, 34, 56]);
        let mut source = InMemorySource::new("base.mp4", frames.clone(), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = StaticImageResolver::new();
        let req = request(vec![], vec![]);

        let result = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap();

        assert_eq!(result.frame_count, 4);
        assert_eq!(sink.frames(), frames.as_slice());
    }

    #[test]
    fn test_disjoint_frame_ranges() {
        let blue = [0, 0, 255];
        let mut source = InMemorySource::new("base.mp4", green_frames(6), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver().with_image("blue.png", RgbImage::from_pixel(3, 1, Rgb(blue)));
        let req = request(
            vec![full_region(0, 0, 1), full_region(1, 3, 4)],
            vec![image("red.png", 0), image("blue.png", 1)],
        );

        CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap();

        let firsts: Vec<[u8; 3]> = sink.frames().iter().map(|f| f.get_pixel(5, 5)).collect();
        assert_eq!(firsts, vec![RED, RED, GREEN, blue, blue, GREEN]);
    }

    #[test]
    fn test_batches_preserve_order() {
        // Each frame carries an 8x8 non-green marker block, large enough to
        // survive mask cleanup, so it shows through the composited image
        let marker = |i: usize| [i as u8 * 10, 0, 200];
        let frames: Vec<Frame> = (0..7)
            .map(|i| {
                let mut frame = Frame::new_filled(20, 20, GREEN);
                for y in 0..8 {
                    for x in 0..8 {
                        frame.set_pixel(x, y, marker(i));
                    }
                }
                frame
            })
            .collect();
        let mut source = InMemorySource::new("base.mp4", frames, 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![full_region(0, 2, 4)], vec![image("red.png", 0)]);

        let options = PipelineOptions {
            progress_interval: 2,
            batch_size: 3,
            worker_threads: 2,
        };
        let result = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .with_options(options)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap();

        assert_eq!(result.frame_count, 7);
        assert_eq!(sink.frames().len(), 7);
        for (i, frame) in sink.frames().iter().enumerate() {
            assert_eq!(frame.get_pixel(0, 0), marker(i), "frame {i} out of order");
            assert_eq!(frame.get_pixel(3, 3), marker(i), "frame {i} out of order");
            let expected = if (2..=4).contains(&i) { RED } else { GREEN };
            assert_eq!(frame.get_pixel(15, 15), expected, "frame {i}");
        }
    }

    #[test]
    fn test_green_video_with_default_settings() {
        let mut source = InMemorySource::new("base.mp4", green_frames(2), 25.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let mut req = request(vec![full_region(0, 0, 1)], vec![image("red.png", 0)]);
        req.chroma_settings = None;

        let result = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap();

        assert_eq!(result.frame_count, 2);
        for frame in sink.frames() {
            assert!(frame.as_image().pixels().all(|p| p.0 == RED));
        }
    }

    #[test]
    fn test_zero_sized_source_rejected() {
        let mut source = InMemorySource::new("base.mp4", vec![], 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![], vec![]);

        let err = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &settings(), "out.mp4")
            .unwrap_err();
        match err {
            CompositorError::Video(VideoError::SourceUnavailable { reason, .. }) => {
                assert_eq!(reason, "video stream has no dimensions");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(source.is_closed());
    }

    #[test]
    fn test_missing_image_counts_skips() {
        let mut source = InMemorySource::new("base.mp4", green_frames(5), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(
            vec![full_region(0, 0, 4), full_region(3, 1, 2)],
            vec![image("red.png", 0)],
        );

        let result = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap();
        assert_eq!(result.frame_count, 5);
        assert_eq!(result.regions_skipped, 2);
    }

    #[test]
    fn test_source_unavailable() {
        let mut source = InMemorySource::new("other.mp4", green_frames(2), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![], vec![]);

        let mut pipeline = CompositingPipeline::new(&mut source, &mut sink, &resolver);
        let err = pipeline.run(&req, &ChromaSettings::default(), "out.mp4").unwrap_err();
        assert_eq!(pipeline.state(), PipelineState::Failed);
        drop(pipeline);

        assert!(matches!(err, CompositorError::Video(VideoError::SourceUnavailable { .. })));
        assert!(sink.locator().is_none());
    }

    #[test]
    fn test_image_fetch_failure_aborts_before_processing() {
        let mut source = InMemorySource::new("base.mp4", green_frames(2), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(
            vec![full_region(0, 0, 1)],
            vec![image("red.png", 0), image("https://example.com/gone.png", 1)],
        );

        let err = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap_err();

        match err {
            CompositorError::Image(crate::error::ImageError::ImageFetchFailed { index, locator, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(locator, "https://example.com/gone.png");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.frames_read(), 0);
        assert!(source.is_closed());
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn test_sink_unavailable_closes_source() {
        let mut source = InMemorySource::new("base.mp4", green_frames(2), 30.0);
        let mut sink = InMemorySink::failing();
        let resolver = red_resolver();
        let req = request(vec![], vec![]);

        let err = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap_err();
        assert!(matches!(err, CompositorError::Video(VideoError::SinkUnavailable { .. })));
        assert!(source.is_closed());
    }

    #[test]
    fn test_invalid_request_rejected_before_opening() {
        let mut source = InMemorySource::new("base.mp4", green_frames(2), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![full_region(0, 5, 1)], vec![image("red.png", 0)]);

        let err = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &ChromaSettings::default(), "out.mp4")
            .unwrap_err();
        assert!(matches!(err, CompositorError::Composition(CompositionError::InvalidRequest { .. })));
        assert_eq!(source.frames_read(), 0);
    }

    #[test]
    fn test_stop_discards_output_and_releases() {
        let mut source = InMemorySource::new("base.mp4", green_frames(10), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![full_region(0, 0, 9)], vec![image("red.png", 0)]);

        let stop = StopHandle::new();
        let seen = Mutex::new(Vec::new());
        let options = PipelineOptions {
            progress_interval: 3,
            ..PipelineOptions::default()
        };
        let callback_stop = stop.clone();
        let mut pipeline = CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .with_options(options)
            .with_stop_handle(stop.clone())
            .on_progress(|p| {
                seen.lock().unwrap().push(p.frames_processed);
                callback_stop.stop();
            });

        let err = pipeline.run(&req, &ChromaSettings::default(), "out.mp4").unwrap_err();
        assert_eq!(pipeline.state(), PipelineState::Failed);
        drop(pipeline);

        assert!(matches!(
            err,
            CompositorError::Composition(CompositionError::Cancelled { frames_processed: 3 })
        ));
        assert!(!err.is_fatal());
        assert_eq!(*seen.lock().unwrap(), vec![3]);
        assert!(stop.is_stopped());
        assert!(sink.is_discarded());
        assert!(source.is_closed());
    }

    #[test]
    fn test_request_settings_override_defaults() {
        // Hue range that excludes pure green keys nothing
        let mut source = InMemorySource::new("base.mp4", green_frames(1), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let mut req = request(vec![full_region(0, 0, 0)], vec![image("red.png", 0)]);
        req.chroma_settings = Some(ChromaSettings {
            hue_range: crate::chroma::ChannelRange::new(100, 120),
            ..settings()
        });

        CompositingPipeline::new(&mut source, &mut sink, &resolver)
            .run(&req, &settings(), "out.mp4")
            .unwrap();
        assert_eq!(sink.frames()[0].get_pixel(5, 5), GREEN);
    }

    #[test]
    fn test_pipeline_runs_once() {
        let mut source = InMemorySource::new("base.mp4", green_frames(1), 30.0);
        let mut sink = InMemorySink::new();
        let resolver = red_resolver();
        let req = request(vec![], vec![]);

        let mut pipeline = CompositingPipeline::new(&mut source, &mut sink, &resolver);
        pipeline.run(&req, &settings(), "out.mp4").unwrap();
        assert!(pipeline.run(&req, &settings(), "out.mp4").is_err());
        assert!(pipeline.state().is_terminal());
    }

    #[test]
    fn test_progress_fraction() {
        let progress = Progress {
            frames_processed: 50,
            total_frames: 200,
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(progress.fraction(), Some(0.25));
        let unknown = Progress {
            total_frames: 0,
            ..progress
        };
        assert_eq!(unknown.fraction(), None);
    }
}
