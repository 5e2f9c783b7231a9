//! Cache entry definitions.
//!
//! A cached thumbnail is a PNG whose text chunks record where it came from.
//! [`Provenance`] models those chunks, [`Thumbnail`] the in-memory artifact
//! that gets written.

use image::{DynamicImage, Rgba, RgbaImage};

use super::path::SizeClass;

/// Text key holding the exact source URI.
pub const KEY_URI: &str = "Thumb::URI";
/// Text key holding the source modification time in decimal seconds.
pub const KEY_MTIME: &str = "Thumb::MTime";
/// Text key identifying the producer.
pub const KEY_SOFTWARE: &str = "Software";
/// Text key holding the original image width.
pub const KEY_IMAGE_WIDTH: &str = "Thumb::Image::Width";
/// Text key holding the original image height.
pub const KEY_IMAGE_HEIGHT: &str = "Thumb::Image::Height";

/// Value written under [`KEY_SOFTWARE`].
pub const SOFTWARE: &str = "MATE::ThumbnailFactory";

/// Provenance fields embedded in a cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// `Thumb::URI`
    pub uri: Option<String>,
    /// `Thumb::MTime`, kept as the raw string found in the file
    pub mtime: Option<String>,
    /// `Software`
    pub software: Option<String>,
    /// `Thumb::Image::Width`
    pub width: Option<u32>,
    /// `Thumb::Image::Height`
    pub height: Option<u32>,
}

impl Provenance {
    /// Provenance for a thumbnail of `uri` last modified at `mtime`.
    #[must_use]
    pub fn for_source(uri: &str, mtime: i64) -> Self {
        Self {
            uri: Some(uri.to_string()),
            mtime: Some(mtime.to_string()),
            software: Some(SOFTWARE.to_string()),
            width: None,
            height: None,
        }
    }

    /// Attach the original image dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: Option<(u32, u32)>) -> Self {
        if let Some((width, height)) = dimensions {
            self.width = Some(width);
            self.height = Some(height);
        }
        self
    }

    /// Whether these fields describe `uri` at `mtime`.
    ///
    /// The URI must match byte-for-byte and the stored mtime must parse as a
    /// base-10 integer equal to `mtime`. A missing field never matches.
    #[must_use]
    pub fn matches(&self, uri: &str, mtime: i64) -> bool {
        let Some(stored_uri) = self.uri.as_deref() else {
            return false;
        };
        if stored_uri != uri {
            return false;
        }
        self.mtime
            .as_deref()
            .and_then(|m| m.parse::<i64>().ok())
            .is_some_and(|m| m == mtime)
    }

    /// Key/value pairs to write, in a stable order.
    #[must_use]
    pub fn text_chunks(&self) -> Vec<(&'static str, String)> {
        let mut chunks = Vec::with_capacity(5);
        if let Some(uri) = &self.uri {
            chunks.push((KEY_URI, uri.clone()));
        }
        if let Some(mtime) = &self.mtime {
            chunks.push((KEY_MTIME, mtime.clone()));
        }
        if let Some(software) = &self.software {
            chunks.push((KEY_SOFTWARE, software.clone()));
        }
        if let Some(width) = self.width {
            chunks.push((KEY_IMAGE_WIDTH, width.to_string()));
        }
        if let Some(height) = self.height {
            chunks.push((KEY_IMAGE_HEIGHT, height.to_string()));
        }
        chunks
    }

    /// Record a text chunk read from a file. Unknown keys are ignored.
    pub fn set_text(&mut self, key: &str, value: String) {
        match key {
            KEY_URI => self.uri = Some(value),
            KEY_MTIME => self.mtime = Some(value),
            KEY_SOFTWARE => self.software = Some(value),
            KEY_IMAGE_WIDTH => self.width = value.trim().parse().ok(),
            KEY_IMAGE_HEIGHT => self.height = value.trim().parse().ok(),
            _ => {}
        }
    }
}

/// An in-memory thumbnail ready to be persisted.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    image: RgbaImage,
    original_size: Option<(u32, u32)>,
}

impl Thumbnail {
    /// Wrap an RGBA image.
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            original_size: None,
        }
    }

    /// Wrap any decoded image.
    #[must_use]
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    /// The 1×1 fully transparent payload of a failure marker.
    #[must_use]
    pub fn failure_marker() -> Self {
        Self::new(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])))
    }

    /// Record the dimensions of the image this thumbnail was made from.
    #[must_use]
    pub fn with_original_size(mut self, width: u32, height: u32) -> Self {
        self.original_size = Some((width, height));
        self
    }

    /// The pixel data.
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Original dimensions, when known.
    #[must_use]
    pub fn original_size(&self) -> Option<(u32, u32)> {
        self.original_size
    }

    /// Shrink to fit the size class, keeping the aspect ratio.
    ///
    /// Images already within bounds are returned untouched. When shrinking,
    /// the pre-scale dimensions are kept as the original size unless one was
    /// already recorded.
    #[must_use]
    pub fn scaled_to(self, size: SizeClass) -> Self {
        let limit = size.pixels();
        let (width, height) = self.image.dimensions();
        if width <= limit && height <= limit {
            return self;
        }
        let original_size = self.original_size.or(Some((width, height)));
        let scaled = DynamicImage::ImageRgba8(self.image)
            .thumbnail(limit, limit)
            .to_rgba8();
        Self {
            image: scaled,
            original_size,
        }
    }
}
