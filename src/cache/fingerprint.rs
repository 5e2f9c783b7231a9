//! Cache key derivation.
//!
//! Thumbnail files are named after the MD5 digest of the source URI, as
//! required by the freedesktop thumbnail specification. The digest is a
//! file name, nothing more: it carries no integrity guarantee.

use md5::{Digest, Md5};

/// Length of a hex-encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// Compute the cache fingerprint of a URI.
///
/// The URI is hashed byte-for-byte with no normalization, so callers must
/// pass the canonical form they will also use for lookups.
///
/// # Example
///
/// ```
/// use thumbcache::cache::fingerprint;
///
/// assert_eq!(fingerprint(""), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
#[must_use]
pub fn fingerprint(uri: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(uri.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check whether a string has the shape of a fingerprint.
#[must_use]
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
