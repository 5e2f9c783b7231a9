//! Application configuration.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. `config.toml` in the platform config directory (or `--config`)
//! 3. `THUMBCACHE_*` environment variables (`__` separates nested keys)
//!
//! ```toml
//! app_id = "mate-thumbnail-factory"
//! size = "large"
//! disable_all = false
//! disabled_mime_types = ["application/pdf"]
//! thumbnailer_dirs = ["/usr/share/thumbnailers"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::{CachePaths, SizeClass, DEFAULT_APP_ID};
use crate::factory::ThumbnailFactory;
use crate::registry::{default_thumbnailer_dirs, MemorySettings, Registry};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "THUMBCACHE_";

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

fn default_true() -> bool {
    true
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing `thumbnails/`. Defaults to the user cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Identifier used to segment failure markers.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Size class produced by default.
    #[serde(default)]
    pub size: SizeClass,

    /// Disable all thumbnailing.
    #[serde(default)]
    pub disable_all: bool,

    /// Mime types never thumbnailed.
    #[serde(default)]
    pub disabled_mime_types: Vec<String>,

    /// Thumbnailer directories, replacing the XDG search path when set.
    #[serde(default)]
    pub thumbnailer_dirs: Option<Vec<PathBuf>>,

    /// Decode common image formats in-process when no thumbnailer is found.
    #[serde(default = "default_true")]
    pub builtin_decoders: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            app_id: default_app_id(),
            size: SizeClass::Normal,
            disable_all: false,
            disabled_mime_types: Vec::new(),
            thumbnailer_dirs: None,
            builtin_decoders: true,
        }
    }
}

impl Config {
    /// Load from the default locations, falling back to defaults on error.
    pub fn load() -> Self {
        match Self::load_from(None) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load with an optional explicit config file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// environment variable has the wrong type.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path().ok(),
        };
        Self::figment(path.as_deref())
            .extract()
            .context("Invalid thumbcache configuration")
    }

    /// The layered configuration sources.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Save as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("org", "thumbcache", "thumbcache")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Cache locations for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory is configured and none can be
    /// determined for the user.
    pub fn cache_paths(&self) -> Result<CachePaths> {
        match &self.cache_dir {
            Some(dir) => Ok(CachePaths::new(dir, &self.app_id)),
            None => {
                let user = CachePaths::for_user()?;
                Ok(CachePaths::new(user.root(), &self.app_id))
            }
        }
    }

    /// Directories searched for thumbnailer definitions.
    #[must_use]
    pub fn thumbnailer_dirs(&self) -> Vec<PathBuf> {
        self.thumbnailer_dirs
            .clone()
            .unwrap_or_else(default_thumbnailer_dirs)
    }

    /// Settings provider seeded with the configured disable policy.
    #[must_use]
    pub fn settings(&self) -> Arc<MemorySettings> {
        Arc::new(MemorySettings::new(
            self.disable_all,
            self.disabled_mime_types.iter().cloned(),
        ))
    }

    /// Build a factory for `size` (or the configured default).
    ///
    /// # Errors
    ///
    /// Returns an error if the cache location cannot be determined.
    pub fn build_factory(&self, size: Option<SizeClass>) -> Result<ThumbnailFactory> {
        let registry = Arc::new(Registry::with_dirs(self.thumbnailer_dirs(), self.settings()));
        Ok(ThumbnailFactory::new(
            self.cache_paths()?,
            size.unwrap_or(self.size),
            registry,
        )
        .with_builtin(self.builtin_decoders))
    }
}
