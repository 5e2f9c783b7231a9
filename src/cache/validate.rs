//! Freshness checks for cached thumbnails and failure markers.
//!
//! Every function here treats a problem with the cached file as a cache miss:
//! a missing file, an unreadable file, a broken PNG and stale provenance all
//! come back as `None` / `false`.

use std::path::{Path, PathBuf};

use super::codec::read_provenance;
use super::entry::Provenance;
use super::path::{CachePaths, SizeClass};

/// Whether in-memory provenance describes `uri` at `mtime`.
#[must_use]
pub fn is_valid(provenance: &Provenance, uri: &str, mtime: i64) -> bool {
    provenance.matches(uri, mtime)
}

/// Return `path` if it holds a PNG whose provenance matches `uri` and
/// `mtime`.
#[must_use]
pub fn validate(path: &Path, uri: &str, mtime: i64) -> Option<PathBuf> {
    let provenance = match read_provenance(path) {
        Ok(p) => p,
        Err(e) => {
            log::trace!("Cache miss for {}: {}", path.display(), e);
            return None;
        }
    };

    if is_valid(&provenance, uri, mtime) {
        Some(path.to_path_buf())
    } else {
        log::trace!("Stale cache entry {} for {}", path.display(), uri);
        None
    }
}

/// Look up a valid thumbnail for `uri` in the given size class.
#[must_use]
pub fn lookup(paths: &CachePaths, uri: &str, mtime: i64, size: SizeClass) -> Option<PathBuf> {
    validate(&paths.thumbnail_path(uri, size), uri, mtime)
}

/// Whether a still-valid failure marker exists for `uri` at `mtime`.
#[must_use]
pub fn has_failed(paths: &CachePaths, uri: &str, mtime: i64) -> bool {
    validate(&paths.failed_path(uri), uri, mtime).is_some()
}

/// Whether `uri` points into a thumbnail cache.
///
/// Thumbnailing our own output would fill the cache with thumbnails of
/// thumbnails.
#[must_use]
pub fn is_thumbnail_uri(uri: &str) -> bool {
    uri.starts_with("file:/") && uri.contains("/thumbnails/")
}
