//! Structured error handling and exit codes.

use serde::Serialize;
use std::path::PathBuf;

/// Exit codes for the thumbcache binary.
///
/// - 0: Success (thumbnail found, generated, or command completed)
/// - 1: General error (unexpected failure)
/// - 2: Not available (cache miss, or no thumbnail could be produced)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the requested thumbnail exists or the command completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Not available: cache miss or generation produced nothing.
    NotAvailable = 2,
    /// Interrupted: the run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "TC000",
            Self::GeneralError => "TC001",
            Self::NotAvailable => "TC002",
            Self::Interrupted => "TC130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "TC001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Errors raised inside the cache engine.
///
/// None of these escape the public cache operations as hard failures: they
/// are logged and collapsed into "no thumbnail available". They are public so
/// lower-level helpers (metadata codec, definition parser) can be used
/// directly.
#[derive(thiserror::Error, Debug)]
pub enum ThumbnailError {
    /// An I/O error occurred on a specific path.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Decoding or processing an image failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Writing a PNG failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(#[from] png::EncodingError),

    /// Reading a PNG failed.
    #[error("PNG decoding failed: {0}")]
    PngDecode(#[from] png::DecodingError),

    /// A `.thumbnailer` definition was malformed or unusable.
    #[error("Invalid thumbnailer definition {path}: {reason}")]
    Definition {
        /// Definition file path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The filesystem watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A command template did not reference the input resource.
    #[error("Command template has no %u or %i placeholder: {0}")]
    InvalidTemplate(String),

    /// The external thumbnailer could not be run or exited unsuccessfully.
    #[error("Thumbnailer command failed: {0}")]
    CommandFailed(String),

    /// No per-user cache directory could be determined.
    #[error("Unable to determine the user cache directory")]
    NoCacheDir,
}

impl ThumbnailError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for engine internals.
pub type ThumbnailResult<T> = Result<T, ThumbnailError>;
