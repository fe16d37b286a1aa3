use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Reasons a recipe is rejected before any step runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("recipe name is empty")]
    EmptyName,

    #[error("invalid recipe name '{0}': only ASCII letters, digits and '-_.+@' are allowed")]
    InvalidName(String),

    #[error("malformed source URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("unsupported URL scheme '{scheme}' in '{url}': must be https or file")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("malformed sha256 '{0}': expected 64 hexadecimal characters")]
    MalformedChecksum(String),

    #[error("could not detect a version from '{0}'; declare one explicitly")]
    UndetectableVersion(String),

    #[error("install step {index}: {reason}")]
    InvalidInstallStep { index: usize, reason: String },

    #[error("test step {index}: {reason}")]
    InvalidTestStep { index: usize, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network unavailable while fetching '{url}': {reason}")]
    NetworkUnavailable { url: String, reason: String },

    #[error("source not found: '{url}'")]
    NotFound { url: String },

    #[error("checksum mismatch for '{url}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("failed to extract '{archive}': {reason}")]
    ExtractionFailed { archive: PathBuf, reason: String },

    #[error("target path already exists: {0} (use --force to overwrite)")]
    TargetPathConflict(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("'{command}' exited with status {code}")]
    NonZeroExit { command: String, code: i32 },
}

#[derive(Error, Debug, Clone)]
pub enum RcpError {
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch Error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Install Error: {0}")]
    Install(#[from] InstallError),

    #[error("Test Error: {0}")]
    Test(#[from] TestError),

    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Parsing Error in {file} line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Registry Error: {0}")]
    Registry(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for RcpError {
    fn from(err: std::io::Error) -> Self {
        RcpError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for RcpError {
    fn from(err: serde_json::Error) -> Self {
        RcpError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for RcpError {
    fn from(err: toml::de::Error) -> Self {
        RcpError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, RcpError>;
