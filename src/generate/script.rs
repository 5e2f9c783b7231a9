//! Thumbnailer command-line expansion.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{ThumbnailError, ThumbnailResult};

/// Local filesystem path of a `file:` URI.
#[must_use]
pub fn local_path(uri: &str) -> Option<PathBuf> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

/// Expand a command template for one thumbnailing run.
///
/// | Placeholder | Replacement |
/// |---|---|
/// | `%u` | shell-quoted `uri` |
/// | `%i` | shell-quoted local path of `uri` (only for local files) |
/// | `%o` | shell-quoted `output` |
/// | `%s` | `size` in pixels |
/// | `%%` | a literal `%` |
///
/// Unknown placeholders are dropped.
///
/// # Errors
///
/// Returns [`ThumbnailError::InvalidTemplate`] if the template ends in a lone
/// `%`, or if neither `%u` nor `%i` was substituted, since the command would
/// then have no way to find its input.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use thumbcache::generate::expand_thumbnailing_script;
///
/// let output = Path::new("/tmp/o.png");
/// let cmd =
///     expand_thumbnailing_script("thumb -s %s %u %o", 128, "file:///a.png", output).unwrap();
/// assert_eq!(cmd, "thumb -s 128 file:///a.png /tmp/o.png");
///
/// assert!(expand_thumbnailing_script("convert -o %o", 128, "file:///a.png", output).is_err());
/// ```
pub fn expand_thumbnailing_script(
    template: &str,
    size: u32,
    uri: &str,
    output: &Path,
) -> ThumbnailResult<String> {
    let mut expanded = String::with_capacity(template.len() + uri.len());
    let mut got_input = false;
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            expanded.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => expanded.push_str(&size.to_string()),
            Some('u') => {
                expanded.push_str(&shell_words::quote(uri));
                got_input = true;
            }
            Some('i') => {
                if let Some(path) = local_path(uri) {
                    expanded.push_str(&shell_words::quote(&path.to_string_lossy()));
                    got_input = true;
                }
            }
            Some('o') => expanded.push_str(&shell_words::quote(&output.to_string_lossy())),
            Some('%') => expanded.push('%'),
            Some(_) => {}
            None => return Err(ThumbnailError::InvalidTemplate(template.to_string())),
        }
    }

    if got_input {
        Ok(expanded)
    } else {
        Err(ThumbnailError::InvalidTemplate(template.to_string()))
    }
}
