use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::region::types::FitMode;

/// Bilinear resampling; images are resized once per region and frame size.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Resizes a source image to exactly fill a target rectangle.
pub struct RegionFitter;

impl RegionFitter {
    /// Produce a `target_width` x `target_height` image from `image` under `mode`.
    ///
    /// Target dimensions must be positive; a zero dimension yields an empty image.
    pub fn fit(image: &RgbImage, target_width: u32, target_height: u32, mode: FitMode) -> RgbImage {
        if target_width == 0 || target_height == 0 {
            return RgbImage::new(target_width, target_height);
        }
        if image.width() == 0 || image.height() == 0 {
            return RgbImage::new(target_width, target_height);
        }

        match mode {
            FitMode::Fill => resize_exact(image, target_width, target_height),
            FitMode::Contain => Self::contain(image, target_width, target_height),
            FitMode::Cover => Self::cover(image, target_width, target_height),
        }
    }

    fn contain(image: &RgbImage, target_width: u32, target_height: u32) -> RgbImage {
        let scale = (target_width as f64 / image.width() as f64)
            .min(target_height as f64 / image.height() as f64);
        let width = scaled(image.width(), scale).clamp(1, target_width);
        let height = scaled(image.height(), scale).clamp(1, target_height);

        let resized = resize_exact(image, width, height);

        let mut canvas = RgbImage::new(target_width, target_height);
        let x = (target_width - width) / 2;
        let y = (target_height - height) / 2;
        imageops::replace(&mut canvas, &resized, x as i64, y as i64);
        canvas
    }

    fn cover(image: &RgbImage, target_width: u32, target_height: u32) -> RgbImage {
        let scale = (target_width as f64 / image.width() as f64)
            .max(target_height as f64 / image.height() as f64);
        // Never undershoot the target because of rounding
        let width = scaled(image.width(), scale).max(target_width);
        let height = scaled(image.height(), scale).max(target_height);

        let resized = resize_exact(image, width, height);

        let x = (width - target_width) / 2;
        let y = (height - target_height) / 2;
        imageops::crop_imm(&resized, x, y, target_width, target_height).to_image()
    }
}

fn scaled(dimension: u32, scale: f64) -> u32 {
    (dimension as f64 * scale).round() as u32
}

fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, RESIZE_FILTER)
}
