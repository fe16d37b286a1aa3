// src/model/mod.rs
// Declares the modules within the model directory.
pub mod artifact;
pub mod receipt;
pub mod recipe;
pub mod version;

// Re-export
pub use artifact::{ChecksumStatus, InstalledPaths, LocalArchivePath};
pub use receipt::InstallReceipt;
pub use recipe::{InstallStep, Recipe, TargetDir, TestStep};
pub use version::Version;
