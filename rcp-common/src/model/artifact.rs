// rcp-common/src/model/artifact.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Outcome of checksum verification for a fetched source archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChecksumStatus {
    /// The archive digest matched the recipe's declared sha256.
    Verified { sha256: String },
    /// The recipe declared no sha256; `actual` is the digest we observed.
    Unverified { actual: String },
}

impl ChecksumStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, ChecksumStatus::Verified { .. })
    }

    pub fn digest(&self) -> &str {
        match self {
            ChecksumStatus::Verified { sha256 } => sha256,
            ChecksumStatus::Unverified { actual } => actual,
        }
    }
}

/// A source archive sitting in the local download cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArchivePath {
    pub path: PathBuf,
    pub checksum: ChecksumStatus,
}

/// Everything `install` placed on disk for one recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledPaths {
    /// `<cellar>/<name>/<version>`
    pub keg: PathBuf,
    /// Files copied into the keg.
    pub files: Vec<PathBuf>,
    /// Symlinks created in the prefix, pointing into the keg.
    pub links: Vec<PathBuf>,
}
