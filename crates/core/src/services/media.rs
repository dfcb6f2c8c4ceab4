//! Image processing for profile pictures and gift images.

use std::io::Cursor;

use gifted_common::{AppError, AppResult, IdGenerator, config::MediaConfig};
use image::{DynamicImage, GenericImageView, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::services::storage::StorageService;

/// Storage prefix for profile pictures.
pub const PROFILE_PICTURES: &str = "profile_pictures";

/// Storage prefix for gift images.
pub const GIFT_IMAGES: &str = "gift_images";

/// A re-encoded image ready to be stored.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Media service: resizes uploads and hands them to storage.
#[derive(Clone)]
pub struct MediaService {
    config: MediaConfig,
    storage: StorageService,
    id_gen: IdGenerator,
}

impl MediaService {
    /// Create a new media service.
    #[must_use]
    pub fn new(config: MediaConfig, storage: StorageService) -> Self {
        Self {
            config,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    /// Decode, shrink to fit `max_dimension`, and re-encode as JPEG.
    pub fn process_image(&self, data: &[u8]) -> AppResult<ProcessedImage> {
        if data.len() > self.config.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "Image exceeds the {} byte upload limit",
                self.config.max_upload_bytes
            )));
        }

        let img = image::load_from_memory(data)
            .map_err(|e| AppError::Validation(format!("Unsupported image: {e}")))?;

        let resized = fit_within(&img, self.config.max_dimension);
        let (width, height) = resized.dimensions();
        let rgb = resized.to_rgb8();

        let mut out = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut out, self.config.jpeg_quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| AppError::Internal(format!("Failed to encode JPEG: {e}")))?;

        Ok(ProcessedImage {
            data: out.into_inner(),
            width,
            height,
        })
    }

    /// Process an upload and store it under `prefix`, returning its public URL.
    pub async fn store_image(&self, prefix: &str, data: Vec<u8>) -> AppResult<String> {
        let service = self.clone();
        let processed = tokio::task::spawn_blocking(move || service.process_image(&data))
            .await
            .map_err(|e| AppError::Internal(format!("Image task failed: {e}")))??;

        let key = format!("{prefix}/{}.jpg", self.id_gen.generate());
        self.storage.save(&key, &processed.data).await?;

        tracing::info!(
            key = %key,
            width = processed.width,
            height = processed.height,
            bytes = processed.data.len(),
            "Stored image"
        );

        Ok(self.storage.get_url(&key))
    }

    /// Delete a previously stored image by its public URL.
    ///
    /// URLs not handed out by this storage are left alone. Failures are
    /// logged and swallowed; the row pointing at the image is already gone.
    pub async fn remove_image(&self, url: &str) {
        let Some(key) = self.storage.key_for_url(url) else {
            tracing::debug!(url = %url, "Image not in local storage; skipping delete");
            return;
        };

        if let Err(e) = self.storage.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete replaced image");
        }
    }
}

/// Scale `img` down so its longer side is at most `max_dimension`.
///
/// Smaller images are returned unchanged.
fn fit_within(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let longest = width.max(height);

    if longest <= max_dimension {
        return img.clone();
    }

    let scale = f64::from(max_dimension) / f64::from(longest);
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);

    img.resize_exact(new_width, new_height, FilterType::Triangle)
}
