// rcp-core/src/lib.rs

pub mod install;
pub mod interpreter;
pub mod smoke;
pub mod uninstall;

// Re-export key types for easier use by the CLI crate
pub use install::{install, InstallOptions};
pub use interpreter::{InstallReport, Interpreter, InterpreterOptions};
pub use smoke::run_test;
pub use uninstall::{uninstall_keg, UninstallReport};
