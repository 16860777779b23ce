use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info};

use crate::error::{ImageError, Result};

/// Decoded user images keyed by region index. Read-only once loading finishes.
pub type ImageSet = HashMap<u32, RgbImage>;

/// Turns an image locator (URL or path) into a decoded RGB raster.
pub trait ImageResolver: Send + Sync {
    /// Fetch and decode the image for `index` at `locator`.
    ///
    /// Fails with [`ImageError::ImageFetchFailed`].
    fn resolve(&self, index: u32, locator: &str) -> Result<RgbImage>;
}

/// Resolves `http(s)://` URLs over the network and everything else from disk.
pub struct DefaultImageResolver {
    timeout: Duration,
    max_bytes: u64,
    client: OnceLock<reqwest::blocking::Client>,
}

impl DefaultImageResolver {
    pub fn new(timeout: Duration, max_bytes: u64) -> Self {
        Self {
            timeout,
            max_bytes,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> std::result::Result<&reqwest::blocking::Client, String> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("greenscreen-compositor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {}", e))?;
        Ok(self.client.get_or_init(|| client))
    }

    fn fetch_remote(&self, url: &str) -> std::result::Result<RgbImage, String> {
        let response = self
            .client()?
            .get(url)
            .send()
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP status {}", status));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(format!("image is {} bytes, limit is {}", length, self.max_bytes));
            }
        }

        let mut bytes = Vec::new();
        response
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| format!("failed to read response body: {}", e))?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(format!("image exceeds {} bytes", self.max_bytes));
        }

        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgb8())
            .map_err(|e| format!("failed to decode image: {}", e))
    }

    fn load_local(&self, path: &Path) -> std::result::Result<RgbImage, String> {
        let metadata = std::fs::metadata(path).map_err(|e| format!("cannot read file: {}", e))?;
        if metadata.len() > self.max_bytes {
            return Err(format!("image is {} bytes, limit is {}", metadata.len(), self.max_bytes));
        }
        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| format!("failed to decode image: {}", e))
    }
}

impl ImageResolver for DefaultImageResolver {
    fn resolve(&self, index: u32, locator: &str) -> Result<RgbImage> {
        let result = if locator.starts_with("http://") || locator.starts_with("https://") {
            self.fetch_remote(locator)
        } else {
            let path = locator.strip_prefix("file://").unwrap_or(locator);
            self.load_local(Path::new(path))
        };

        let image = result.map_err(|reason| ImageError::ImageFetchFailed {
            index,
            locator: locator.to_string(),
            reason,
        })?;

        info!("Loaded user image {} ({}x{}) from {}", index, image.width(), image.height(), locator);
        Ok(image)
    }
}

/// Resolver backed by a fixed table of pre-decoded images.
#[derive(Debug, Default, Clone)]
pub struct StaticImageResolver {
    images: HashMap<String, RgbImage>,
}

impl StaticImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image<S: Into<String>>(mut self, locator: S, image: RgbImage) -> Self {
        self.images.insert(locator.into(), image);
        self
    }
}

impl ImageResolver for StaticImageResolver {
    fn resolve(&self, index: u32, locator: &str) -> Result<RgbImage> {
        self.images.get(locator).cloned().ok_or_else(|| {
            ImageError::ImageFetchFailed {
                index,
                locator: locator.to_string(),
                reason: "not found".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use image::Rgb;
    use tempfile::tempdir;

    fn resolver() -> DefaultImageResolver {
        DefaultImageResolver::new(Duration::from_secs(5), 10 * 1024 * 1024)
    }

    #[test]
    fn test_resolves_local_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        RgbImage::from_pixel(3, 2, Rgb([200, 10, 10])).save(&path).unwrap();

        let image = resolver().resolve(0, path.to_str().unwrap()).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(*image.get_pixel(1, 1), Rgb([200, 10, 10]));

        let uri = format!("file://{}", path.display());
        assert!(resolver().resolve(0, &uri).is_ok());
    }

    #[test]
    fn test_missing_file_reports_index_and_locator() {
        let err = resolver().resolve(4, "/definitely/not/here.png").unwrap_err();
        match err {
            CompositorError::Image(ImageError::ImageFetchFailed { index, locator, .. }) => {
                assert_eq!(index, 4);
                assert_eq!(locator, "/definitely/not/here.png");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_image_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(resolver().resolve(0, path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_size_limit_enforced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.png");
        RgbImage::from_pixel(64, 64, Rgb([1, 2, 3])).save(&path).unwrap();

        let tiny = DefaultImageResolver::new(Duration::from_secs(5), 16);
        assert!(tiny.resolve(0, path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_static_resolver() {
        let resolver = StaticImageResolver::new().with_image("red", RgbImage::new(2, 2));
        assert!(resolver.resolve(0, "red").is_ok());
        assert!(resolver.resolve(1, "blue").is_err());
    }
}
