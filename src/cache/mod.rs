//! On-disk thumbnail cache.
//!
//! This module implements the freedesktop thumbnail cache layout: content
//! addressed file names, provenance validation and atomic persistence.
//!
//! # Architecture
//!
//! * [`fingerprint`]: MD5-based cache keys derived from URIs.
//! * [`path`]: Pure mapping from (URI, size class) to cache file locations.
//! * [`entry`]: The in-memory thumbnail and the provenance fields it carries.
//! * [`codec`]: PNG encoding/decoding with provenance text chunks.
//! * [`validate`]: Freshness checks for thumbnails and failure markers.
//! * [`store`]: Atomic writes of thumbnails and failure markers.
//!
//! # Cache Invalidation
//!
//! Entries are keyed by URI alone. Each file embeds the URI and the source
//! modification time it was generated from; if either differs from what the
//! caller passes at lookup time the entry is treated as missing and the next
//! save overwrites it.

pub mod codec;
pub mod entry;
pub mod fingerprint;
pub mod path;
pub mod store;
pub mod validate;

pub use entry::{Provenance, Thumbnail};
pub use fingerprint::fingerprint;
pub use path::{CachePaths, SizeClass, DEFAULT_APP_ID};
pub use store::{create_failed_thumbnail, save, SaveOutcome};
pub use validate::{has_failed, is_thumbnail_uri, is_valid, lookup, validate};
