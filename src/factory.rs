//! Thumbnail factory: cache lookups, generation and persistence behind one
//! handle.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use thumbcache::cache::{CachePaths, SizeClass};
//! use thumbcache::factory::ThumbnailFactory;
//! use thumbcache::registry::{MemorySettings, Registry};
//!
//! let registry = Arc::new(Registry::new(Arc::new(MemorySettings::default())));
//! let factory = ThumbnailFactory::new(CachePaths::for_user()?, SizeClass::Normal, registry);
//!
//! let uri = "file:///home/user/photo.png";
//! let mtime = 1_700_000_000;
//! if let Some(path) = factory.lookup(uri, mtime) {
//!     println!("cached at {}", path.display());
//! } else if factory.can_generate(uri, Some("image/png"), mtime) {
//!     match factory.generate(uri, "image/png") {
//!         Some(thumbnail) => {
//!             factory.save(&thumbnail, uri, mtime);
//!         }
//!         None => {
//!             factory.create_failed_thumbnail(uri, mtime);
//!         }
//!     }
//! }
//! # Ok::<(), thumbcache::error::ThumbnailError>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{self, CachePaths, SaveOutcome, SizeClass, Thumbnail};
use crate::generate::{Generator, PreviewSource};
use crate::registry::Registry;

/// Creates and caches thumbnails of one size class.
///
/// Safe to share between threads. Two threads generating the same URI at
/// once both do the work; the last rename wins.
#[derive(Debug)]
pub struct ThumbnailFactory {
    paths: CachePaths,
    size: SizeClass,
    generator: Generator,
}

impl ThumbnailFactory {
    /// Create a factory writing below `paths` and using `registry` for
    /// external thumbnailers.
    #[must_use]
    pub fn new(paths: CachePaths, size: SizeClass, registry: Arc<Registry>) -> Self {
        Self {
            paths,
            size,
            generator: Generator::new(registry),
        }
    }

    /// Consult `source` for embedded previews before running thumbnailers.
    #[must_use]
    pub fn with_preview_source(mut self, source: Arc<dyn PreviewSource>) -> Self {
        self.generator = self.generator.with_preview_source(source);
        self
    }

    /// Enable or disable in-process decoding of common image formats.
    #[must_use]
    pub fn with_builtin(mut self, enabled: bool) -> Self {
        self.generator = self.generator.with_builtin(enabled);
        self
    }

    /// Cache locations.
    #[must_use]
    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Size class produced by this factory.
    #[must_use]
    pub fn size(&self) -> SizeClass {
        self.size
    }

    /// Thumbnailer registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        self.generator.registry()
    }

    /// Path of a valid cached thumbnail for `uri` at `mtime`.
    ///
    /// # Arguments
    ///
    /// * `uri` - Source URI, compared byte-for-byte with `Thumb::URI`
    /// * `mtime` - Source modification time in seconds since the epoch
    ///
    /// # Returns
    ///
    /// The cache file path if it exists and its provenance matches, `None`
    /// on any kind of miss.
    #[must_use]
    pub fn lookup(&self, uri: &str, mtime: i64) -> Option<PathBuf> {
        cache::lookup(&self.paths, uri, mtime, self.size)
    }

    /// Whether generation already failed for `uri` at `mtime`.
    #[must_use]
    pub fn has_failed(&self, uri: &str, mtime: i64) -> bool {
        cache::has_failed(&self.paths, uri, mtime)
    }

    /// Whether it is worth trying to generate a thumbnail.
    ///
    /// # Arguments
    ///
    /// * `uri` - Source URI
    /// * `mime_type` - Content type of the source, if known
    /// * `mtime` - Source modification time in seconds since the epoch
    ///
    /// # Returns
    ///
    /// `false` for files inside a thumbnail cache, for unknown mime types,
    /// for mime types with no generator under the current disable policy,
    /// and when a failure marker for `(uri, mtime)` exists.
    #[must_use]
    pub fn can_generate(&self, uri: &str, mime_type: Option<&str>, mtime: i64) -> bool {
        if cache::is_thumbnail_uri(uri) {
            return false;
        }
        let Some(mime_type) = mime_type else {
            return false;
        };
        if !self.generator.supports(mime_type) {
            return false;
        }
        !self.has_failed(uri, mtime)
    }

    /// Generate a thumbnail without touching the cache.
    ///
    /// Blocks while an external thumbnailer runs. Failures are logged at
    /// debug level; the caller decides whether to record a failure marker.
    #[must_use]
    pub fn generate(&self, uri: &str, mime_type: &str) -> Option<Thumbnail> {
        self.generator.generate(uri, mime_type, self.size)
    }

    /// Persist `thumbnail`, falling back to a failure marker on error.
    ///
    /// # Returns
    ///
    /// What ended up on disk. See [`SaveOutcome`].
    pub fn save(&self, thumbnail: &Thumbnail, uri: &str, mtime: i64) -> SaveOutcome {
        cache::save(&self.paths, thumbnail, uri, mtime, self.size)
    }

    /// Record that generation failed for `uri` at `mtime`.
    pub fn create_failed_thumbnail(&self, uri: &str, mtime: i64) -> Option<PathBuf> {
        cache::create_failed_thumbnail(&self.paths, uri, mtime)
    }

    /// Return a valid cached thumbnail, generating and saving one if needed.
    ///
    /// A generation failure is recorded so later calls return `None`
    /// immediately.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use thumbcache::cache::{CachePaths, SizeClass};
    /// use thumbcache::registry::{MemorySettings, Registry};
    /// use thumbcache::ThumbnailFactory;
    ///
    /// let registry = Arc::new(Registry::new(Arc::new(MemorySettings::default())));
    /// let factory = ThumbnailFactory::new(CachePaths::for_user()?, SizeClass::Large, registry);
    /// if let Some(path) = factory.thumbnail_for("file:///tmp/a.png", Some("image/png"), 1000) {
    ///     println!("{}", path.display());
    /// }
    /// # Ok::<(), thumbcache::error::ThumbnailError>(())
    /// ```
    pub fn thumbnail_for(&self, uri: &str, mime_type: Option<&str>, mtime: i64) -> Option<PathBuf> {
        if let Some(path) = self.lookup(uri, mtime) {
            return Some(path);
        }
        if !self.can_generate(uri, mime_type, mtime) {
            return None;
        }
        let mime_type = mime_type?;
        match self.generate(uri, mime_type) {
            Some(thumbnail) => match self.save(&thumbnail, uri, mtime) {
                SaveOutcome::Saved(path) => Some(path),
                SaveOutcome::RecordedFailure(_) | SaveOutcome::Dropped => None,
            },
            None => {
                self.create_failed_thumbnail(uri, mtime);
                None
            }
        }
    }
}
