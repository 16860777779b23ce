use image::RgbImage;
use tracing::trace;

use crate::chroma::{AlphaMask, ChromaSettings, ColorMasker, MaskRefiner, SpillCorrector};
use crate::error::Result;
use crate::images::ImageSet;
use crate::region::{GreenScreenRegion, PixelRect, RegionFitter};
use crate::video::types::Frame;

/// Why a region contributed nothing to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No user image was loaded for the region's index
    MissingImage,
    /// The clipped pixel rectangle is empty
    DegenerateRect,
    /// The alpha sub-grid does not match the fitted image
    MaskSizeMismatch,
}

/// What happened to each active region on one frame.
/// Entries are positions in the request's region list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub composited: Vec<usize>,
    pub skipped: Vec<(usize, SkipReason)>,
}

/// A region with its image already fitted to its rectangle for one frame size.
#[derive(Debug)]
pub struct PreparedRegion<'a> {
    pub region: &'a GreenScreenRegion,
    slot: std::result::Result<(PixelRect, RgbImage), SkipReason>,
}

impl PreparedRegion<'_> {
    /// Why this region will be skipped on every frame it is active, if it will
    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.slot.as_ref().err().copied()
    }
}

/// Regions fitted for a fixed frame size. The rectangle and the fitted image
/// only depend on the frame dimensions, so a whole video can share one set.
#[derive(Debug)]
pub struct PreparedRegions<'a> {
    width: u32,
    height: u32,
    regions: Vec<PreparedRegion<'a>>,
}

impl<'a> PreparedRegions<'a> {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreparedRegion<'a>> {
        self.regions.iter()
    }

    fn any_active(&self, frame_index: u64) -> bool {
        self.regions.iter().any(|p| p.region.is_active(frame_index))
    }
}

/// Composites user images into the key-colored parts of a single frame.
pub struct FrameCompositor;

impl FrameCompositor {
    /// Composite every region active at `frame_index` into a copy of `frame`.
    pub fn composite(
        frame: &Frame,
        frame_index: u64,
        regions: &[GreenScreenRegion],
        images: &ImageSet,
        settings: &ChromaSettings,
    ) -> Result<Frame> {
        Self::composite_with_report(frame, frame_index, regions, images, settings).map(|(out, _)| out)
    }

    /// Like [`composite`](Self::composite), also reporting composited and skipped regions.
    pub fn composite_with_report(
        frame: &Frame,
        frame_index: u64,
        regions: &[GreenScreenRegion],
        images: &ImageSet,
        settings: &ChromaSettings,
    ) -> Result<(Frame, FrameReport)> {
        // Only fit what this frame needs
        let active: Vec<GreenScreenRegion> = regions
            .iter()
            .filter(|r| r.is_active(frame_index))
            .cloned()
            .collect();
        let prepared = Self::prepare(&active, images, frame.width(), frame.height());
        let (out, mut report) = Self::composite_prepared(frame, frame_index, &prepared, settings)?;

        // Report positions in the caller's list, not the filtered one
        let positions: Vec<usize> = regions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_active(frame_index))
            .map(|(i, _)| i)
            .collect();
        for i in report.composited.iter_mut() {
            *i = positions[*i];
        }
        for (i, _) in report.skipped.iter_mut() {
            *i = positions[*i];
        }
        Ok((out, report))
    }

    /// Resolve rectangles and fit images for `width` x `height` frames.
    pub fn prepare<'a>(
        regions: &'a [GreenScreenRegion],
        images: &ImageSet,
        width: u32,
        height: u32,
    ) -> PreparedRegions<'a> {
        let regions = regions
            .iter()
            .map(|region| {
                let slot = match images.get(&region.index) {
                    None => Err(SkipReason::MissingImage),
                    Some(image) => match region.position.to_pixels(width, height) {
                        None => Err(SkipReason::DegenerateRect),
                        Some(rect) => {
                            let fitted = RegionFitter::fit(image, rect.width, rect.height, region.fit_mode);
                            Ok((rect, fitted))
                        }
                    },
                };
                PreparedRegion { region, slot }
            })
            .collect();

        PreparedRegions {
            width,
            height,
            regions,
        }
    }

    /// Composite using regions prepared for this frame's size.
    ///
    /// Regions are applied in list order, so a later region overwrites an
    /// earlier one where their rectangles overlap. Spill correction, when
    /// enabled, runs over the whole output whether or not a region was active.
    pub fn composite_prepared(
        frame: &Frame,
        frame_index: u64,
        prepared: &PreparedRegions<'_>,
        settings: &ChromaSettings,
    ) -> Result<(Frame, FrameReport)> {
        let mut output = frame.clone();
        let mut report = FrameReport::default();

        if prepared.any_active(frame_index) {
            let mask = ColorMasker::mask(frame, settings);
            let alpha = MaskRefiner::refine(&mask, settings.edge_feather)?;

            for (position, entry) in prepared.regions.iter().enumerate() {
                if !entry.region.is_active(frame_index) {
                    continue;
                }

                let (rect, fitted) = match &entry.slot {
                    Ok(slot) => slot,
                    Err(reason) => {
                        report.skipped.push((position, *reason));
                        continue;
                    }
                };

                let region_alpha = alpha.sub_grid(rect.x, rect.y, rect.width, rect.height);
                if region_alpha.dimensions() != fitted.dimensions() {
                    report.skipped.push((position, SkipReason::MaskSizeMismatch));
                    continue;
                }

                blend_into(&mut output, rect, fitted, &region_alpha);
                report.composited.push(position);
                trace!(
                    "Frame {}: region {} -> {}x{} at ({}, {})",
                    frame_index, entry.region.index, rect.width, rect.height, rect.x, rect.y
                );
            }
        }

        if settings.spill_removal > 0.0 {
            SpillCorrector::correct_in_place(&mut output, settings.spill_removal);
        }

        Ok((output, report))
    }
}

/// `out = out * (1 - a) + fitted * a` per channel, rounded to nearest.
fn blend_into(output: &mut Frame, rect: &PixelRect, fitted: &RgbImage, alpha: &AlphaMask) {
    let image = output.as_image_mut();
    for dy in 0..rect.height {
        for dx in 0..rect.width {
            let a = alpha.get(dx, dy);
            if a <= 0.0 {
                continue;
            }
            let src = fitted.get_pixel(dx, dy).0;
            let dst = image.get_pixel_mut(rect.x + dx, rect.y + dy);
            for c in 0..3 {
                let blended = dst.0[c] as f32 * (1.0 - a) + src[c] as f32 * a;
                dst.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
