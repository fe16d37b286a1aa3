// rcp-aio/src/lib.rs
//! Asynchronous IO helpers for rcp (checksums, child processes)

pub mod checksum;
pub mod process;

pub use checksum::{sha256_file_async, verify_checksum_async};
pub use process::run_command_async;
