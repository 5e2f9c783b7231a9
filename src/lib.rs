//! thumbcache - Freedesktop Thumbnail Cache Engine
//!
//! A portable implementation of the thumbnail cache used by freedesktop
//! desktops: MD5-named PNG files under `$XDG_CACHE_HOME/thumbnails`,
//! validated against the source URI and modification time embedded in each
//! file, written atomically, with failure markers so broken files are not
//! retried. External thumbnailers are discovered from `.thumbnailer`
//! definitions and reloaded when those change.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod generate;
pub mod logging;
pub mod progress;
pub mod registry;
pub mod signal;

pub use app::run_app;
pub use factory::ThumbnailFactory;
