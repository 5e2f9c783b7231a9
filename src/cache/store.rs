//! Persistence of thumbnails and failure markers.
//!
//! Files are written to a temporary sibling, restricted to mode 0600 and then
//! renamed over the final name, so readers only ever see complete files.
//! Directories are created with mode 0700.

use std::fs::{self, DirBuilder};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbaImage;

use super::codec::encode_png;
use super::entry::{Provenance, Thumbnail};
use super::path::{CachePaths, SizeClass};
use crate::error::{ThumbnailError, ThumbnailResult};

/// What a call to [`save`] ended up persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The thumbnail was written at this path.
    Saved(PathBuf),
    /// The thumbnail could not be written; a failure marker was recorded
    /// at this path instead.
    RecordedFailure(PathBuf),
    /// Neither the thumbnail nor the failure marker could be written.
    Dropped,
}

impl SaveOutcome {
    /// Path of the thumbnail, if it was saved.
    #[must_use]
    pub fn saved_path(&self) -> Option<&Path> {
        match self {
            Self::Saved(path) => Some(path),
            _ => None,
        }
    }
}

/// Persist `thumbnail` as the cached thumbnail of `uri` at `mtime`.
///
/// On any failure a failure marker is written instead, so the next caller
/// does not retry an operation that is known not to work.
///
/// # Arguments
///
/// * `paths` - Cache locations
/// * `thumbnail` - Image to store; its original size, if known, is recorded
///   as `Thumb::Image::Width` and `Thumb::Image::Height`
/// * `uri` - Source URI, stored as `Thumb::URI`
/// * `mtime` - Source modification time, stored as `Thumb::MTime`
/// * `size` - Size class directory to write into
///
/// # Returns
///
/// [`SaveOutcome::Saved`] with the cache path, [`SaveOutcome::RecordedFailure`]
/// if only the failure marker could be written, or [`SaveOutcome::Dropped`].
///
/// # Example
///
/// ```rust,no_run
/// use image::RgbaImage;
/// use thumbcache::cache::{save, CachePaths, SizeClass, Thumbnail};
///
/// let paths = CachePaths::for_user()?;
/// let thumbnail = Thumbnail::new(RgbaImage::new(128, 96));
/// let outcome = save(&paths, &thumbnail, "file:///tmp/a.png", 1000, SizeClass::Normal);
/// assert!(outcome.saved_path().is_some());
/// # Ok::<(), thumbcache::error::ThumbnailError>(())
/// ```
pub fn save(
    paths: &CachePaths,
    thumbnail: &Thumbnail,
    uri: &str,
    mtime: i64,
    size: SizeClass,
) -> SaveOutcome {
    let path = paths.thumbnail_path(uri, size);
    let provenance =
        Provenance::for_source(uri, mtime).with_dimensions(thumbnail.original_size());

    match write_atomic(&path, thumbnail.image(), &provenance) {
        Ok(()) => {
            log::debug!("Saved thumbnail for {} at {}", uri, path.display());
            SaveOutcome::Saved(path)
        }
        Err(e) => {
            log::warn!("Failed to save thumbnail for {}: {}", uri, e);
            match create_failed_thumbnail(paths, uri, mtime) {
                Some(marker) => SaveOutcome::RecordedFailure(marker),
                None => SaveOutcome::Dropped,
            }
        }
    }
}

/// Record that thumbnailing `uri` at `mtime` failed.
///
/// Returns the marker path, or `None` if the marker itself could not be
/// written (which is logged and otherwise ignored).
pub fn create_failed_thumbnail(paths: &CachePaths, uri: &str, mtime: i64) -> Option<PathBuf> {
    let path = paths.failed_path(uri);
    let marker = Thumbnail::failure_marker();
    match write_atomic(&path, marker.image(), &Provenance::for_source(uri, mtime)) {
        Ok(()) => {
            log::debug!("Recorded failed thumbnail for {}", uri);
            Some(path)
        }
        Err(e) => {
            log::warn!("Failed to record failed thumbnail for {}: {}", uri, e);
            None
        }
    }
}

/// Write a PNG to `path` via a temporary file in the same directory.
///
/// # Errors
///
/// Returns an error if the directory cannot be created, or the file cannot
/// be written, chmod-ed or renamed into place.
pub fn write_atomic(
    path: &Path,
    image: &RgbaImage,
    provenance: &Provenance,
) -> ThumbnailResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| ThumbnailError::io(path, std::io::ErrorKind::InvalidInput.into()))?;
    create_private_dir(dir)?;

    let prefix = format!(
        ".{}.",
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("thumbnail")
    );
    let temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".png")
        .tempfile_in(dir)
        .map_err(|e| ThumbnailError::io(dir, e))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        encode_png(&mut writer, image, provenance)?;
        writer.flush().map_err(|e| ThumbnailError::io(temp.path(), e))?;
    }
    set_private_mode(temp.path())?;

    temp.persist(path)
        .map_err(|e| ThumbnailError::io(path, e.error))?;
    Ok(())
}

fn create_private_dir(dir: &Path) -> ThumbnailResult<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| ThumbnailError::io(dir, e))
}

fn set_private_mode(path: &Path) -> ThumbnailResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| ThumbnailError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
