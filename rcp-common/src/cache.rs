// rcp-common/src/cache.rs
// Download cache for source archives

use std::fs;
use std::path::{Path, PathBuf};

use super::error::Result;
use crate::model::Version;
use crate::Config;

/// Cache struct to manage downloaded source archives
#[derive(Debug, Clone)]
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    /// Create a new Cache using the config's cache_dir
    pub fn new(config: &Config) -> Result<Self> {
        Self::at(config.cache_dir())
    }

    pub fn at(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }
        Ok(Self { cache_dir })
    }

    /// Gets the cache directory path
    pub fn get_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache location for a recipe's source archive: `<name>--<version>--<file>`.
    pub fn download_path(&self, name: &str, version: &Version, url: &str) -> PathBuf {
        let file_name = url
            .split(['?', '#'])
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("download");
        self.cache_dir
            .join(format!("{name}--{version}--{file_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_path_keeps_archive_name() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::at(dir.path().join("cache")).unwrap();
        assert!(cache.get_dir().is_dir());
        let path = cache.download_path(
            "app2xcode",
            &Version::new("1.0.0"),
            "https://github.com/jimmckay/app2xcode/archive/v1.0.0.tar.gz?raw=1",
        );
        assert_eq!(
            path,
            dir.path().join("cache").join("app2xcode--1.0.0--v1.0.0.tar.gz")
        );
    }
}
