//! Cache path resolution.
//!
//! Maps a URI and a [`SizeClass`] to the location of its thumbnail, and a URI
//! alone to the location of its failure marker. Nothing here touches the
//! filesystem.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use super::fingerprint::fingerprint;
use crate::error::{ThumbnailError, ThumbnailResult};

/// Application identifier used to segment failure markers.
pub const DEFAULT_APP_ID: &str = "mate-thumbnail-factory";

/// Name of the directory holding all thumbnail data below the cache root.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Name of the failure marker directory below [`THUMBNAILS_DIR`].
pub const FAIL_DIR: &str = "fail";

/// Thumbnail size class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// 128×128 thumbnails in `thumbnails/normal`.
    #[default]
    Normal,
    /// 256×256 thumbnails in `thumbnails/large`.
    Large,
}

impl SizeClass {
    /// Cache subdirectory name.
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Large => "large",
        }
    }

    /// Target edge length in pixels.
    #[must_use]
    pub fn pixels(self) -> u32 {
        match self {
            Self::Normal => 128,
            Self::Large => 256,
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Resolves cache file locations under a cache root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    root: PathBuf,
    app_id: String,
}

impl CachePaths {
    /// Create a resolver rooted at `root` (the directory that contains
    /// `thumbnails/`).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, app_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            app_id: app_id.into(),
        }
    }

    /// Resolver for the per-user cache directory (`$XDG_CACHE_HOME` on
    /// Linux) with the default application identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::NoCacheDir`] if no home directory is known.
    pub fn for_user() -> ThumbnailResult<Self> {
        let dirs = BaseDirs::new().ok_or(ThumbnailError::NoCacheDir)?;
        Ok(Self::new(dirs.cache_dir(), DEFAULT_APP_ID))
    }

    /// The cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Application identifier used for failure markers.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// `<root>/thumbnails`
    #[must_use]
    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join(THUMBNAILS_DIR)
    }

    /// `<root>/thumbnails/<size>`
    #[must_use]
    pub fn size_dir(&self, size: SizeClass) -> PathBuf {
        self.thumbnails_dir().join(size.dir_name())
    }

    /// `<root>/thumbnails/fail/<app_id>`
    #[must_use]
    pub fn fail_dir(&self) -> PathBuf {
        self.thumbnails_dir().join(FAIL_DIR).join(&self.app_id)
    }

    /// Path of the thumbnail for `uri` in the given size class.
    #[must_use]
    pub fn thumbnail_path(&self, uri: &str, size: SizeClass) -> PathBuf {
        self.size_dir(size).join(file_name(uri))
    }

    /// Path of the failure marker for `uri`. Markers are shared between size
    /// classes.
    #[must_use]
    pub fn failed_path(&self, uri: &str) -> PathBuf {
        self.fail_dir().join(file_name(uri))
    }
}

fn file_name(uri: &str) -> String {
    format!("{}.png", fingerprint(uri))
}
