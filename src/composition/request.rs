use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chroma::ChromaSettings;
use crate::error::{CompositionError, Result};
use crate::region::GreenScreenRegion;

/// A user-supplied still image and the region index it fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserImage {
    /// URL or local path
    pub url: String,
    pub index: u32,
}

/// Everything needed to composite one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRequest {
    pub base_video_path: String,

    #[serde(default)]
    pub user_images: Vec<UserImage>,

    #[serde(default)]
    pub green_screen_regions: Vec<GreenScreenRegion>,

    /// Falls back to the configured defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chroma_settings: Option<ChromaSettings>,
}

impl CompositeRequest {
    /// Load a request from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            CompositionError::InvalidRequest {
                details: format!("{}: {}", path.display(), e),
            }
            .into()
        })
    }

    /// Reject malformed requests before any work starts.
    ///
    /// Regions whose index has no image are not an error here; they are
    /// skipped frame by frame.
    pub fn validate(&self) -> Result<()> {
        if self.base_video_path.trim().is_empty() {
            return Err(CompositionError::InvalidRequest {
                details: "base_video_path is empty".to_string(),
            }
            .into());
        }

        for image in &self.user_images {
            if image.url.trim().is_empty() {
                return Err(CompositionError::InvalidRequest {
                    details: format!("user image {} has an empty url", image.index),
                }
                .into());
            }
        }

        for region in &self.green_screen_regions {
            region.validate()?;
        }

        if let Some(settings) = &self.chroma_settings {
            settings.validate()?;
        }

        Ok(())
    }

    /// Region indices that no user image provides, in ascending order
    pub fn unresolved_indices(&self) -> Vec<u32> {
        let provided: BTreeSet<u32> = self.user_images.iter().map(|img| img.index).collect();
        let wanted: BTreeSet<u32> = self.green_screen_regions.iter().map(|r| r.index).collect();
        wanted.difference(&provided).copied().collect()
    }
}

/// Outcome of a finished compositing job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub output_video_path: String,

    /// Frames read, composited and written
    pub frame_count: u64,

    pub processing_time_secs: f64,

    /// Region-frame pairs that were skipped (missing image or empty rectangle)
    #[serde(default)]
    pub regions_skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{FitMode, NormalizedRect};

    const SAMPLE: &str = r#"{
        "base_video_path": "videos/shot1.mp4",
        "user_images": [
            {"url": "https://example.com/a.jpg", "index": 0},
            {"url": "photos/b.png", "index": 1}
        ],
        "green_screen_regions": [
            {"index": 0, "startFrame": 0, "endFrame": 500,
             "position": {"x": 0.2, "y": 0.3, "width": 0.6, "height": 0.4}, "fitMode": "cover"},
            {"index": 2, "startFrame": 501, "endFrame": 1000,
             "position": {"x": 0.15, "y": 0.25, "width": 0.7, "height": 0.5}, "fitMode": "contain"}
        ],
        "chroma_settings": {
            "hue_range": [35, 85], "sat_range": [40, 255], "val_range": [40, 255],
            "edge_feather": 5, "spill_removal": 0.5
        }
    }"#;

    #[test]
    fn test_parse_sample_request() {
        let request: CompositeRequest = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(request.user_images.len(), 2);
        assert_eq!(request.green_screen_regions[1].fit_mode, FitMode::Contain);
        assert_eq!(request.chroma_settings, Some(ChromaSettings::default()));
        assert!(request.validate().is_ok());
        assert_eq!(request.unresolved_indices(), vec![2]);
    }

    #[test]
    fn test_chroma_settings_optional() {
        let request: CompositeRequest =
            serde_json::from_str(r#"{"base_video_path": "in.mp4"}"#).unwrap();
        assert!(request.chroma_settings.is_none());
        assert!(request.green_screen_regions.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let mut request: CompositeRequest = serde_json::from_str(SAMPLE).unwrap();
        request.green_screen_regions.push(GreenScreenRegion {
            index: 0,
            start_frame: 9,
            end_frame: 3,
            position: NormalizedRect::full(),
            fit_mode: FitMode::Fill,
        });
        assert!(request.validate().is_err());

        let mut request: CompositeRequest = serde_json::from_str(SAMPLE).unwrap();
        request.chroma_settings.as_mut().unwrap().edge_feather = -2;
        assert!(request.validate().is_err());

        let mut request: CompositeRequest = serde_json::from_str(SAMPLE).unwrap();
        request.base_video_path = " ".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_roundtrip() {
        let request: CompositeRequest = serde_json::from_str(SAMPLE).unwrap();
        let json = serde_json::to_string(&request).unwrap();
        let back: CompositeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_result_wire_names() {
        let result = CompositeResult {
            output_video_path: "out/composite.mp4".to_string(),
            frame_count: 1517,
            processing_time_secs: 12.5,
            regions_skipped: 0,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["output_video_path"], "out/composite.mp4");
        assert_eq!(value["frame_count"], 1517);
    }
}
