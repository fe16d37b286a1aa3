// rcp-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::debug;

use super::error::{RcpError, Result};

// Used when RCP_PREFIX is unset and no per-user data directory can be determined.
const DEFAULT_FALLBACK_PREFIX: &str = "/usr/local/rcp";
const PREFIX_ENV: &str = "RCP_PREFIX";
const CACHE_ENV: &str = "RCP_CACHE_DIR";

#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf,
    pub cache_override: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading rcp configuration");

        let prefix = match env::var(PREFIX_ENV).ok().filter(|s| !s.is_empty()) {
            Some(p) => PathBuf::from(p),
            None => {
                let fallback = BaseDirs::new()
                    .map(|dirs| dirs.data_local_dir().join("rcp"))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FALLBACK_PREFIX));
                debug!(
                    "{} not set or empty, falling back to default: {}",
                    PREFIX_ENV,
                    fallback.display()
                );
                fallback
            }
        };

        let cache_override = env::var(CACHE_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let config = Self::with_prefix(prefix)?;
        debug!("Effective prefix set to: {}", config.prefix.display());
        Ok(Self {
            cache_override,
            ..config
        })
    }

    /// Builds a configuration rooted at `prefix`, ignoring the environment.
    pub fn with_prefix(prefix: impl Into<PathBuf>) -> Result<Self> {
        let prefix = prefix.into();
        if !prefix.is_absolute() {
            return Err(RcpError::Config(format!(
                "prefix must be an absolute path, got '{}'",
                prefix.display()
            )));
        }
        Ok(Self {
            prefix,
            cache_override: None,
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.prefix.join("Cellar")
    }

    pub fn recipes_dir(&self) -> PathBuf {
        self.prefix.join("Library").join("Recipes")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_override
            .clone()
            .unwrap_or_else(|| self.prefix.join("rcp_cache"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.prefix.join("rcp_logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.prefix.join("tmp")
    }

    pub fn recipe_cellar_dir(&self, recipe_name: &str) -> PathBuf {
        self.cellar_dir().join(recipe_name)
    }

    pub fn keg_path(&self, recipe_name: &str, version_str: &str) -> PathBuf {
        self.recipe_cellar_dir(recipe_name).join(version_str)
    }
}
