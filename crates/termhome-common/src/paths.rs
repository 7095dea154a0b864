//! Standard filesystem paths for termhome.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// Default configuration directory.
///
/// `TERMHOME_CONFIG_DIR` wins, then `$XDG_CONFIG_HOME/termhome` (or the
/// platform equivalent), then `./config`.
pub static TERMHOME_CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("TERMHOME_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::config_dir()
                .map(|dir| dir.join("termhome"))
                .unwrap_or_else(|| PathBuf::from("config"))
        })
});

/// Standard paths used by termhome.
#[derive(Debug, Clone)]
pub struct HomePaths {
    /// Configuration directory.
    pub config_dir: PathBuf,
}

impl Default for HomePaths {
    fn default() -> Self {
        Self {
            config_dir: TERMHOME_CONFIG_DIR.clone(),
        }
    }
}

impl HomePaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths rooted at a custom configuration directory.
    #[must_use]
    pub fn with_config_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
        }
    }

    /// Main configuration file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.yaml")
    }

    /// Resolve the configuration file to load.
    ///
    /// An explicit path always wins over the standard location.
    #[must_use]
    pub fn resolve_config(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| self.config_file(), Path::to_path_buf)
    }
}
