// rcp-common/src/keg.rs
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::config::Config;
use super::error::{RcpError, Result};
use super::model::{InstallReceipt, Version};

const RECEIPT_DIR: &str = ".rcp";
const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

/// Represents information about an installed recipe (Keg).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeg {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
}

impl InstalledKeg {
    pub fn receipt_path(&self) -> PathBuf {
        receipt_path(&self.path)
    }
}

pub fn receipt_path(keg_path: &Path) -> PathBuf {
    keg_path.join(RECEIPT_DIR).join(RECEIPT_FILE)
}

/// Installed-recipe registry backed by the Cellar. Passed explicitly to
/// everything that needs to know what is installed.
#[derive(Debug, Clone)]
pub struct KegRegistry {
    config: Config,
}

impl KegRegistry {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cellar_path(&self) -> PathBuf {
        self.config.cellar_dir()
    }

    pub fn get_keg_path(&self, name: &str, version: &Version) -> PathBuf {
        self.config.keg_path(name, version.as_str())
    }

    /// All installed versions of `name`, oldest first.
    pub fn installed_versions(&self, name: &str) -> Result<Vec<InstalledKeg>> {
        let recipe_dir = self.config.recipe_cellar_dir(name);
        if !recipe_dir.is_dir() {
            debug!(
                "[KEG_REGISTRY:{}] {} not found; nothing installed.",
                name,
                recipe_dir.display()
            );
            return Ok(Vec::new());
        }

        let mut kegs = Vec::new();
        for entry in fs::read_dir(&recipe_dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        "[KEG_REGISTRY:{}] Error reading entry in '{}': {}. Skipping.",
                        name,
                        recipe_dir.display(),
                        e
                    );
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(version_str) = path.file_name().and_then(|n| n.to_str()) {
                kegs.push(InstalledKeg {
                    name: name.to_string(),
                    version: Version::new(version_str),
                    path: path.clone(),
                });
            }
        }
        kegs.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(kegs)
    }

    /// The newest installed version of `name`, if any.
    pub fn get_installed_keg(&self, name: &str) -> Result<Option<InstalledKeg>> {
        let latest = self.installed_versions(name)?.pop();
        if let Some(keg) = &latest {
            debug!(
                "[KEG_REGISTRY:{}] latest keg: path={}, version={}",
                name,
                keg.path.display(),
                keg.version
            );
        }
        Ok(latest)
    }

    pub fn list_installed_kegs(&self) -> Result<Vec<InstalledKeg>> {
        let cellar_dir = self.cellar_path();
        if !cellar_dir.is_dir() {
            debug!("[KEG_REGISTRY] Cellar directory NOT FOUND. Returning empty list.");
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&cellar_dir)?
            .filter_map(|entry| match entry {
                Ok(e) if e.path().is_dir() => e.file_name().to_str().map(str::to_string),
                Ok(_) => None,
                Err(e) => {
                    warn!("[KEG_REGISTRY] Error reading entry in cellar: {}. Skipping.", e);
                    None
                }
            })
            .collect();
        names.sort();

        let mut installed = Vec::new();
        for name in names {
            installed.extend(self.installed_versions(&name)?);
        }
        debug!(
            "[KEG_REGISTRY] Found {} installed keg versions.",
            installed.len()
        );
        Ok(installed)
    }

    pub fn read_receipt(&self, keg: &InstalledKeg) -> Result<InstallReceipt> {
        let path = keg.receipt_path();
        if !path.is_file() {
            return Err(RcpError::NotFound(format!(
                "No install receipt for {} {} at {}",
                keg.name,
                keg.version,
                path.display()
            )));
        }
        let raw = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_receipt(&self, keg_path: &Path, receipt: &InstallReceipt) -> Result<PathBuf> {
        let path = receipt_path(keg_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(receipt)?)?;
        debug!("Wrote install receipt {}", path.display());
        Ok(path)
    }
}
