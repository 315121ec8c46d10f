//! Featured image storage
//!
//! Uploaded images are resized to a fixed canvas and stored in the content
//! store under a folder named after the current date (`/YYYY/MM/DD/`).
//! The stored path is what the post row keeps in its `image` column.
//!
//! Decoding and encoding run on the blocking thread pool. Names are reserved
//! with an atomic create-new so concurrent uploads of the same file name
//! always end up at distinct paths.

use crate::config::ImageConfig;
use crate::models::UploadedImage;
use crate::services::storage::{DynContentStore, StorageError};
use chrono::{NaiveDate, Utc};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use uuid::Uuid;

/// How many file names are tried before giving up
pub const MAX_NAME_ATTEMPTS: usize = 8;

/// Error types for image storage
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Upload is empty or has no usable file name
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Every candidate name was already taken
    #[error("No free file name for {0}")]
    NameExhausted(String),

    /// Bytes could not be decoded or re-encoded
    #[error("Image processing failed: {0}")]
    Processing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A stored image read back from the content store
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Saves, reads and deletes featured images
pub struct ImageStore {
    store: DynContentStore,
    canvas: ImageConfig,
}

impl ImageStore {
    pub fn new(store: DynContentStore, canvas: ImageConfig) -> Self {
        Self { store, canvas }
    }

    /// Resize and store an upload, returning its content-store path.
    pub async fn save_image(&self, upload: &UploadedImage) -> Result<String, ImageError> {
        if !upload.is_valid() {
            return Err(ImageError::InvalidUpload(format!(
                "'{}' is empty or has no file name",
                upload.original_name
            )));
        }

        let extension = upload.extension();
        let bytes = upload.bytes.clone();
        let canvas = self.canvas;
        let encoded = tokio::task::spawn_blocking(move || {
            resize_to_canvas(&bytes, extension.as_deref(), canvas.width, canvas.height)
        })
        .await
        .map_err(|e| ImageError::Processing(format!("resize task failed: {}", e)))??;

        let folder = date_folder(Utc::now().date_naive());
        self.store.ensure_dir(&folder).await?;

        let path = self.reserve_name(&folder, upload).await?;
        if let Err(e) = self.store.write(&path, &encoded).await {
            if let Err(cleanup) = self.store.delete(&path).await {
                tracing::warn!("Failed to remove reserved image {}: {}", path, cleanup);
            }
            return Err(e.into());
        }

        tracing::debug!("Stored image {} ({} bytes)", path, encoded.len());
        Ok(path)
    }

    async fn reserve_name(&self, folder: &str, upload: &UploadedImage) -> Result<String, ImageError> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = format!("{}{}", folder, candidate_name(upload, attempt));
            if self.store.create_new(&path).await? {
                return Ok(path);
            }
        }
        Err(ImageError::NameExhausted(upload.file_name().to_string()))
    }

    /// Load a stored image. `None` if nothing is stored at `path`.
    pub async fn read_image(&self, path: &str) -> Result<Option<StoredImage>, ImageError> {
        let bytes = match self.store.read(path).await? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        Ok(Some(StoredImage {
            bytes,
            content_type: content_type_for(path),
        }))
    }

    /// Delete a stored image. Returns whether something was removed.
    pub async fn delete_image(&self, path: &str) -> Result<bool, ImageError> {
        Ok(self.store.delete(path).await?)
    }
}

/// Folder for images uploaded on `date`, e.g. `/2024/05/17/`
pub fn date_folder(date: NaiveDate) -> String {
    format!("/{}/", date.format("%Y/%m/%d"))
}

/// The original file name first, then `<stem>-<uuid>.<ext>` variants
fn candidate_name(upload: &UploadedImage, attempt: usize) -> String {
    if attempt == 0 {
        return upload.file_name().to_string();
    }
    let suffix = Uuid::new_v4().simple().to_string();
    match upload.extension() {
        Some(ext) => format!("{}-{}.{}", upload.stem(), suffix, ext),
        None => format!("{}-{}", upload.stem(), suffix),
    }
}

fn content_type_for(path: &str) -> &'static str {
    ImageFormat::from_path(Path::new(path))
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Decode, resize to exactly `width`x`height` and re-encode.
///
/// The output format follows the file extension when it names a writable
/// format, otherwise the detected input format.
pub fn resize_to_canvas(
    bytes: &[u8],
    extension: Option<&str>,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Processing(format!("Failed to read image: {}", e)))?;
    let detected = reader.format();
    let decoded = reader
        .decode()
        .map_err(|e| ImageError::Processing(format!("Failed to decode image: {}", e)))?;

    let format = extension
        .and_then(ImageFormat::from_extension)
        .filter(|f| f.writing_enabled())
        .or(detected)
        .ok_or_else(|| ImageError::Processing("Unknown image format".to_string()))?;

    let resized = decoded.resize_exact(width, height, FilterType::Lanczos3);
    // JPEG has no alpha channel
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, format)
        .map_err(|e| ImageError::Processing(format!("Failed to encode image: {}", e)))?;
    Ok(out.into_inner())
}
