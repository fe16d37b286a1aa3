// rcp-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod error;
pub mod formulary;
pub mod keg;
pub mod model;
pub mod parse;
pub mod validation;

// Re-export key types
pub use cache::Cache;
pub use config::Config;
pub use error::{FetchError, InstallError, RcpError, Result, TestError, ValidationError};
pub use formulary::Formulary;
pub use keg::{InstalledKeg, KegRegistry};
pub use model::{InstallStep, Recipe, TargetDir, TestStep, Version};
pub use validation::{validate, ValidRecipe};
