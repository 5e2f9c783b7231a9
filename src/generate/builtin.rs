//! In-process thumbnail generation for common image formats.
//!
//! Used when no external thumbnailer handles a mime type but the `image`
//! crate can decode it directly.

use std::path::Path;

use image::ImageReader;

use crate::cache::{SizeClass, Thumbnail};
use crate::error::{ThumbnailError, ThumbnailResult};

/// Mime types decoded in-process.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/gif",
    "image/bmp",
    "image/x-bmp",
    "image/x-ms-bmp",
    "image/tiff",
    "image/webp",
];

/// Whether `mime_type` can be thumbnailed in-process.
#[must_use]
pub fn supports(mime_type: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime_type)
}

/// Decode the image at `path` and shrink it to the size class.
///
/// The format is sniffed from the file contents, not the extension.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn thumbnail_file(path: &Path, size: SizeClass) -> ThumbnailResult<Thumbnail> {
    let image = ImageReader::open(path)
        .map_err(|e| ThumbnailError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| ThumbnailError::io(path, e))?
        .decode()?;

    let (width, height) = (image.width(), image.height());
    Ok(Thumbnail::from_dynamic(image)
        .with_original_size(width, height)
        .scaled_to(size))
}
