//! App-private photo storage
//!
//! Photos are re-encoded as JPEG under random names in `diary_images/`,
//! and a downscaled copy is written to `diary_thumbnails/thumb_<name>`.
//!
//! Codec and file failures never abort the caller: saving returns `None`
//! and deletion is best-effort, both logged.

use crate::config::{
    IMAGES_DIR_NAME, IMAGE_JPEG_QUALITY, THUMBNAILS_DIR_NAME, THUMBNAIL_JPEG_QUALITY,
    THUMBNAIL_TARGET_WIDTH,
};
use crate::database::{DiaryImage, ImageInput};
use crate::error::{AppError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Photo and thumbnail directories
#[derive(Clone)]
pub struct ImageStore {
    images_dir: PathBuf,
    thumbnails_dir: PathBuf,
}

impl ImageStore {
    /// Create a store rooted in the app data directory
    pub fn new(app_data_dir: &Path) -> Self {
        Self {
            images_dir: app_data_dir.join(IMAGES_DIR_NAME),
            thumbnails_dir: app_data_dir.join(THUMBNAILS_DIR_NAME),
        }
    }

    /// Create both directories if needed
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.images_dir).await?;
        fs::create_dir_all(&self.thumbnails_dir).await?;
        tracing::info!(
            "Image store initialized at: {:?} / {:?}",
            self.images_dir,
            self.thumbnails_dir
        );
        Ok(())
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn thumbnails_dir(&self) -> &Path {
        &self.thumbnails_dir
    }

    /// Persist a compressed copy of the input. `None` if it cannot be decoded or written.
    pub async fn save_image(&self, input: &ImageInput) -> Option<PathBuf> {
        match self.try_save_image(input).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Skipping image that could not be saved: {}", e);
                None
            }
        }
    }

    /// Write a thumbnail for a stored image. `None` on failure.
    pub async fn create_thumbnail(&self, image_path: &Path) -> Option<PathBuf> {
        match self.try_create_thumbnail(image_path).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Could not create thumbnail for {:?}: {}", image_path, e);
                None
            }
        }
    }

    /// Remove a file, ignoring failures
    pub async fn delete_file(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Deleted image file: {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Image file already gone: {:?}", path);
            }
            Err(e) => tracing::warn!("Failed to delete image file {:?}: {}", path, e),
        }
    }

    /// Remove the photo and thumbnail behind an image row, ignoring failures
    pub async fn delete_image_files(&self, image: &DiaryImage) {
        self.delete_file(Path::new(&image.image_path)).await;
        if let Some(thumbnail) = &image.thumbnail_path {
            self.delete_file(Path::new(thumbnail)).await;
        }
    }

    async fn try_save_image(&self, input: &ImageInput) -> Result<PathBuf> {
        let data = match input {
            ImageInput::Path(path) => fs::read(path).await?,
            ImageInput::Bytes(bytes) => bytes.clone(),
        };

        let jpeg = tokio::task::spawn_blocking(move || {
            let decoded = image::load_from_memory(&data)?;
            encode_jpeg(&decoded, IMAGE_JPEG_QUALITY)
        })
        .await??;

        let path = self.images_dir.join(format!("diary_{}.jpg", Uuid::new_v4()));
        write_atomic(&path, &jpeg).await?;

        tracing::debug!("Saved image: {:?} ({} bytes)", path, jpeg.len());
        Ok(path)
    }

    async fn try_create_thumbnail(&self, image_path: &Path) -> Result<PathBuf> {
        let file_name = image_path
            .file_name()
            .ok_or_else(|| AppError::InvalidInput(format!("Not a file path: {:?}", image_path)))?;
        let target = self
            .thumbnails_dir
            .join(format!("thumb_{}", file_name.to_string_lossy()));

        let source = image_path.to_path_buf();
        let jpeg = tokio::task::spawn_blocking(move || encode_thumbnail(&source)).await??;

        write_atomic(&target, &jpeg).await?;

        tracing::debug!("Created thumbnail: {:?}", target);
        Ok(target)
    }
}

/// Read the image bounds first, then scale down by a power-of-two factor so
/// the width lands at or above the thumbnail target.
fn encode_thumbnail(source: &Path) -> Result<Vec<u8>> {
    let (width, height) = image::image_dimensions(source)?;
    let factor = sample_factor(width);

    let decoded = image::open(source)?;
    let scaled = if factor > 1 {
        decoded.resize_exact(
            (width / factor).max(1),
            (height / factor).max(1),
            FilterType::Triangle,
        )
    } else {
        decoded
    };

    encode_jpeg(&scaled, THUMBNAIL_JPEG_QUALITY)
}

/// Largest power of two not above `width / THUMBNAIL_TARGET_WIDTH`, at least 1
fn sample_factor(width: u32) -> u32 {
    let ratio = (width / THUMBNAIL_TARGET_WIDTH).max(1);
    1 << ratio.ilog2()
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.to_rgb8().write_with_encoder(encoder)?;
    Ok(buffer)
}

/// Write to a temp file first, then rename into place
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;

    fs::rename(&temp_path, path).await?;
    Ok(())
}
