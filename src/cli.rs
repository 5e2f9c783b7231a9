//! Command-line interface definitions.
//!
//! ```bash
//! # Cache file name for a URI
//! thumbcache fingerprint file:///home/user/a.png
//!
//! # Is there a fresh thumbnail?
//! thumbcache lookup file:///home/user/a.png --mtime 1700000000
//!
//! # Thumbnail a batch of files into the large cache
//! thumbcache generate --size large ~/Pictures/*.png
//!
//! # Show which thumbnailers handle which mime types
//! thumbcache thumbnailers --json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cache::SizeClass;

/// Freedesktop thumbnail cache tool.
#[derive(Debug, Parser)]
#[command(name = "thumbcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file to use instead of the default one
    #[arg(long, global = true, value_name = "FILE", env = "THUMBCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the cache fingerprint of a URI
    Fingerprint(FingerprintArgs),
    /// Print the cache path of a URI
    Path(PathArgs),
    /// Check for a valid cached thumbnail
    Lookup(LookupArgs),
    /// Generate and cache thumbnails for local files
    Generate(GenerateArgs),
    /// List registered thumbnailers
    Thumbnailers(ThumbnailersArgs),
    /// Watch thumbnailer directories and report changes until Ctrl+C
    Watch,
}

/// Arguments for `fingerprint`.
#[derive(Debug, Args)]
pub struct FingerprintArgs {
    /// Resource URI
    pub uri: String,
}

/// Arguments for `path`.
#[derive(Debug, Args)]
pub struct PathArgs {
    /// Resource URI
    pub uri: String,

    /// Size class
    #[arg(short, long, value_enum)]
    pub size: Option<SizeClass>,

    /// Print the failure marker path instead
    #[arg(long)]
    pub failed: bool,
}

/// Arguments for `lookup`.
#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Resource URI
    pub uri: String,

    /// Source modification time in seconds since the epoch
    #[arg(long, allow_negative_numbers = true)]
    pub mtime: i64,

    /// Size class
    #[arg(short, long, value_enum)]
    pub size: Option<SizeClass>,

    /// Also report whether a failure marker exists
    #[arg(long)]
    pub check_failed: bool,
}

/// Arguments for `generate`.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Files to thumbnail
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Size class
    #[arg(short, long, value_enum)]
    pub size: Option<SizeClass>,

    /// Mime type to assume for every file (otherwise guessed from the extension)
    #[arg(long)]
    pub mime: Option<String>,

    /// Regenerate even if a valid thumbnail or failure marker exists
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `thumbnailers`.
#[derive(Debug, Args)]
pub struct ThumbnailersArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
