use serde::{Deserialize, Serialize};

use crate::error::{CompositionError, Result};

/// How a source image is mapped onto a region of different aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Stretch to the exact target size, ignoring aspect ratio
    Fill,
    /// Scale to fit inside the target, letterboxed on black
    Contain,
    /// Scale to cover the target, center-cropped
    #[default]
    Cover,
}

impl std::fmt::Display for FitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FitMode::Fill => "fill",
            FitMode::Contain => "contain",
            FitMode::Cover => "cover",
        };
        f.write_str(name)
    }
}

/// Rectangle in frame-relative coordinates, each component in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle in pixels, guaranteed to lie inside the frame it was made for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The whole frame
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn validate(&self) -> Result<()> {
        let components = [("x", self.x), ("y", self.y), ("width", self.width), ("height", self.height)];
        for (name, value) in components {
            if !(0.0..=1.0).contains(&value) {
                return Err(CompositionError::InvalidRequest {
                    details: format!("position.{} must be within [0, 1], got {}", name, value),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Convert to pixels for a `frame_width` x `frame_height` frame.
    ///
    /// Every component is rounded half away from zero. The origin is clamped
    /// into the frame and the extent clipped to what remains; `None` means the
    /// clipped rectangle is empty.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }

        let (x, width) = clip_axis(self.x, self.width, frame_width);
        let (y, height) = clip_axis(self.y, self.height, frame_height);

        if width <= 0 || height <= 0 {
            return None;
        }

        Some(PixelRect {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
        })
    }
}

fn clip_axis(origin: f64, extent: f64, dimension: u32) -> (i64, i64) {
    let dimension = dimension as i64;
    let start = ((origin * dimension as f64).round() as i64).clamp(0, dimension - 1);
    let length = ((extent * dimension as f64).round() as i64).min(dimension - start);
    (start, length)
}

/// One green screen slot: which image goes where, and during which frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenScreenRegion {
    /// Key into the loaded user images
    pub index: u32,

    /// First active frame (inclusive)
    pub start_frame: u64,

    /// Last active frame (inclusive)
    pub end_frame: u64,

    pub position: NormalizedRect,

    #[serde(default)]
    pub fit_mode: FitMode,
}

impl GreenScreenRegion {
    pub fn is_active(&self, frame_index: u64) -> bool {
        (self.start_frame..=self.end_frame).contains(&frame_index)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_frame > self.end_frame {
            return Err(CompositionError::InvalidRequest {
                details: format!(
                    "region {} has startFrame {} after endFrame {}",
                    self.index, self.start_frame, self.end_frame
                ),
            }
            .into());
        }
        self.position.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_rect_covers_frame() {
        let rect = NormalizedRect::full().to_pixels(10, 10).unwrap();
        assert_eq!(rect, PixelRect { x: 0, y: 0, width: 10, height: 10 });
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        // 0.25 * 10 = 2.5 -> 3, 0.45 * 10 = 4.5 -> 5
        let rect = NormalizedRect::new(0.25, 0.25, 0.45, 0.45).to_pixels(10, 10).unwrap();
        assert_eq!(rect, PixelRect { x: 3, y: 3, width: 5, height: 5 });
    }

    #[test]
    fn test_extent_clipped_to_frame() {
        let rect = NormalizedRect::new(0.6, 0.0, 0.8, 1.0).to_pixels(10, 20).unwrap();
        assert_eq!(rect.x, 6);
        assert_eq!(rect.width, 4);
        assert_eq!(rect.height, 20);
    }

    #[test]
    fn test_origin_clamped_inside_frame() {
        let rect = NormalizedRect::new(1.0, 1.0, 0.5, 0.5).to_pixels(10, 10).unwrap();
        assert_eq!(rect, PixelRect { x: 9, y: 9, width: 1, height: 1 });
    }

    #[test]
    fn test_degenerate_rect_skipped() {
        assert!(NormalizedRect::new(0.5, 0.5, 0.0, 0.5).to_pixels(10, 10).is_none());
        assert!(NormalizedRect::new(0.5, 0.5, 0.04, 0.5).to_pixels(10, 10).is_none());
        assert!(NormalizedRect::full().to_pixels(0, 10).is_none());
    }

    #[test]
    fn test_region_activity_is_inclusive() {
        let region = GreenScreenRegion {
            index: 0,
            start_frame: 5,
            end_frame: 7,
            position: NormalizedRect::full(),
            fit_mode: FitMode::Cover,
        };
        assert!(!region.is_active(4));
        assert!(region.is_active(5));
        assert!(region.is_active(7));
        assert!(!region.is_active(8));
    }

    #[test]
    fn test_region_wire_format() {
        let json = r#"{"index":1,"startFrame":0,"endFrame":500,"position":{"x":0.2,"y":0.3,"width":0.6,"height":0.4}}"#;
        let region: GreenScreenRegion = serde_json::from_str(json).unwrap();
        assert_eq!(region.fit_mode, FitMode::Cover);
        assert_eq!(region.end_frame, 500);

        let value = serde_json::to_value(&region).unwrap();
        assert_eq!(value["fitMode"], "cover");
        assert_eq!(value["startFrame"], 0);
    }

    #[test]
    fn test_unknown_fit_mode_rejected() {
        let json = r#"{"index":1,"startFrame":0,"endFrame":5,"position":{"x":0,"y":0,"width":1,"height":1},"fitMode":"stretch"}"#;
        assert!(serde_json::from_str::<GreenScreenRegion>(json).is_err());
    }

    #[test]
    fn test_region_validation() {
        let mut region = GreenScreenRegion {
            index: 0,
            start_frame: 10,
            end_frame: 5,
            position: NormalizedRect::full(),
            fit_mode: FitMode::Fill,
        };
        assert!(region.validate().is_err());

        region.end_frame = 10;
        assert!(region.validate().is_ok());

        region.position.width = 1.2;
        assert!(region.validate().is_err());
    }
}
