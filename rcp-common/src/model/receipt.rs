// rcp-common/src/model/receipt.rs
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::artifact::{ChecksumStatus, InstalledPaths};
use super::recipe::Recipe;
use super::version::Version;

/// Written into every keg so later commands (test, uninstall, list) work
/// without the original recipe file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallReceipt {
    pub recipe: Recipe,
    pub version: Version,
    pub source_url: String,
    pub checksum: ChecksumStatus,
    pub files: Vec<PathBuf>,
    pub links: Vec<PathBuf>,
    pub installed_at: String,
}

impl InstallReceipt {
    pub fn new(
        recipe: &Recipe,
        version: &Version,
        checksum: &ChecksumStatus,
        paths: &InstalledPaths,
    ) -> Self {
        Self {
            recipe: recipe.clone(),
            version: version.clone(),
            source_url: recipe.url.clone(),
            checksum: checksum.clone(),
            files: paths.files.clone(),
            links: paths.links.clone(),
            installed_at: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
        }
    }
}
