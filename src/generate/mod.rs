//! Thumbnail generation pipeline.
//!
//! Generation tries, in order:
//!
//! 1. a preview embedded in the resource ([`PreviewSource`]),
//! 2. the external thumbnailer registered for the mime type,
//! 3. in-process decoding for image formats the `image` crate reads.
//!
//! Generation never writes to the cache. Callers persist the result with
//! [`crate::cache::save`], or record a failure marker when nothing came back.
//!
//! External thumbnailers run synchronously on the calling thread with no
//! timeout. A hung thumbnailer blocks its caller.

pub mod builtin;
pub mod preview;
pub mod script;

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use image::ImageReader;

use crate::cache::codec::read_provenance;
use crate::cache::{SizeClass, Thumbnail};
use crate::error::{ThumbnailError, ThumbnailResult};
use crate::registry::Registry;

pub use preview::PreviewSource;
pub use script::{expand_thumbnailing_script, local_path};

/// Produces thumbnails for resources.
pub struct Generator {
    registry: Arc<Registry>,
    preview: Option<Arc<dyn PreviewSource>>,
    builtin: bool,
}

impl Generator {
    /// Create a generator backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            preview: None,
            builtin: true,
        }
    }

    /// Consult `source` for embedded previews before anything else.
    #[must_use]
    pub fn with_preview_source(mut self, source: Arc<dyn PreviewSource>) -> Self {
        self.preview = Some(source);
        self
    }

    /// Enable or disable in-process decoding of common image formats.
    #[must_use]
    pub fn with_builtin(mut self, enabled: bool) -> Self {
        self.builtin = enabled;
        self
    }

    /// The registry consulted for external thumbnailers.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Whether any generator is available for `mime_type` under the current
    /// disable policy.
    #[must_use]
    pub fn supports(&self, mime_type: &str) -> bool {
        if self.registry.is_disabled(mime_type) {
            return false;
        }
        self.registry.lookup(mime_type).is_some() || (self.builtin && builtin::supports(mime_type))
    }

    /// Generate a thumbnail for `uri` of type `mime_type`.
    ///
    /// Returns `None` when no generator succeeded. The reason is logged.
    #[must_use]
    pub fn generate(&self, uri: &str, mime_type: &str, size: SizeClass) -> Option<Thumbnail> {
        if let Some(image) = self.preview.as_ref().and_then(|p| p.preview(uri)) {
            log::debug!("Using embedded preview for {}", uri);
            let (width, height) = (image.width(), image.height());
            return Some(
                Thumbnail::from_dynamic(image)
                    .with_original_size(width, height)
                    .scaled_to(size),
            );
        }

        if let Some(template) = self.registry.command_for(mime_type) {
            return match run_thumbnailer(&template, uri, size) {
                Ok(thumbnail) => Some(thumbnail),
                Err(e) => {
                    log::debug!("Thumbnailer failed for {}: {}", uri, e);
                    None
                }
            };
        }

        if self.builtin && builtin::supports(mime_type) && !self.registry.is_disabled(mime_type) {
            let path = local_path(uri)?;
            return match builtin::thumbnail_file(&path, size) {
                Ok(thumbnail) => Some(thumbnail),
                Err(e) => {
                    log::debug!("Could not decode {}: {}", uri, e);
                    None
                }
            };
        }

        log::debug!("No thumbnailer for {} ({})", uri, mime_type);
        None
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("registry", &self.registry)
            .field("preview", &self.preview.is_some())
            .field("builtin", &self.builtin)
            .finish()
    }
}

/// Run an external thumbnailer command template against `uri`.
///
/// The command writes into a fresh temporary file, which is loaded and then
/// deleted.
///
/// # Errors
///
/// Returns an error if the template is invalid, the command cannot be
/// spawned or exits unsuccessfully, or its output is not a readable image.
pub fn run_thumbnailer(template: &str, uri: &str, size: SizeClass) -> ThumbnailResult<Thumbnail> {
    let output = tempfile::Builder::new()
        .prefix(".thumbcache-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| ThumbnailError::io(std::env::temp_dir(), e))?
        .into_temp_path();

    let command = expand_thumbnailing_script(template, size.pixels(), uri, &output)?;
    let argv = shell_words::split(&command)
        .map_err(|e| ThumbnailError::CommandFailed(format!("{command}: {e}")))?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ThumbnailError::InvalidTemplate(template.to_string()))?;

    log::debug!("Running thumbnailer: {}", command);
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| ThumbnailError::CommandFailed(format!("{program}: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ThumbnailError::CommandFailed(format!(
            "{} exited with {}: {}",
            program,
            result.status,
            stderr.trim()
        )));
    }

    load_output(&output, size)
}

fn load_output(path: &Path, size: SizeClass) -> ThumbnailResult<Thumbnail> {
    let image = ImageReader::open(path)
        .map_err(|e| ThumbnailError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| ThumbnailError::io(path, e))?
        .decode()?;

    // Thumbnailers may report the source dimensions in the PNG they write.
    let original = read_provenance(path)
        .ok()
        .and_then(|p| p.width.zip(p.height));

    let mut thumbnail = Thumbnail::from_dynamic(image);
    if let Some((width, height)) = original {
        thumbnail = thumbnail.with_original_size(width, height);
    }
    Ok(thumbnail.scaled_to(size))
}
