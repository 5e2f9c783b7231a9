//! Embedded preview images.
//!
//! Some resources carry a ready-made preview (camera RAW files, documents
//! with embedded thumbnails, remote filesystems that serve previews). A
//! [`PreviewSource`] exposes those so generation can skip spawning an
//! external thumbnailer.

use image::DynamicImage;

/// Supplies preview images stored in a resource's own metadata.
pub trait PreviewSource: Send + Sync {
    /// Preview image for `uri`, if the resource has one.
    fn preview(&self, uri: &str) -> Option<DynamicImage>;
}

impl<F> PreviewSource for F
where
    F: Fn(&str) -> Option<DynamicImage> + Send + Sync,
{
    fn preview(&self, uri: &str) -> Option<DynamicImage> {
        self(uri)
    }
}
