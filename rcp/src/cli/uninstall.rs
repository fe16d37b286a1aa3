// rcp/src/cli/uninstall.rs
use std::path::Path;

use clap::Args;
use colored::Colorize;
use rcp_common::config::Config;
use rcp_common::error::{RcpError, Result};
use rcp_common::keg::KegRegistry;
use rcp_common::validation::validate_name;
use rcp_core::uninstall_keg;
use tracing::{debug, error};

#[derive(Args, Debug)]
pub struct Uninstall {
    /// The names of the recipes to uninstall
    #[arg(required = true)]
    pub names: Vec<String>,
}

impl Uninstall {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let kegs = KegRegistry::new(config.clone());
        let mut errors: Vec<(String, RcpError)> = Vec::new();

        for name in &self.names {
            if let Err(e) = validate_name(name) {
                error!("✖ {}", e);
                errors.push((name.clone(), e.into()));
                continue;
            }

            println!("Uninstalling {name}...");
            match kegs.get_installed_keg(name) {
                Ok(Some(keg)) => {
                    let (file_count, size_bytes) =
                        count_files_and_size(&keg.path).unwrap_or((0, 0));
                    debug!("Attempting uninstall for {} {}", name, keg.version);
                    match uninstall_keg(&keg, &kegs) {
                        Ok(report) => println!(
                            "✓ Uninstalled {} {} ({} files, {}, {} link(s) removed)",
                            name.green(),
                            keg.version,
                            file_count,
                            format_size(size_bytes),
                            report.links_removed.len()
                        ),
                        Err(e) => {
                            error!("✖ Failed to uninstall '{}': {}", name.cyan(), e);
                            errors.push((name.clone(), e));
                        }
                    }
                }
                Ok(None) => {
                    let msg = format!("Recipe '{name}' is not installed.");
                    error!("✖ {msg}");
                    errors.push((name.clone(), RcpError::NotFound(msg)));
                }
                Err(e) => {
                    error!("✖ Failed check install status for '{}': {}", name, e);
                    errors.push((name.clone(), e));
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        eprintln!("\n{}:", "Finished uninstalling with errors".yellow());
        for (name, error) in &errors {
            eprintln!("Recipe '{}':", name.cyan());
            eprintln!("- {}", error.to_string().red());
        }
        Err(RcpError::Generic(
            "Uninstall failed for one or more recipes.".to_string(),
        ))
    }
}

pub(crate) fn count_files_and_size(path: &Path) -> Result<(usize, u64)> {
    let mut file_count = 0;
    let mut total_size = 0;
    for entry in walkdir::WalkDir::new(path) {
        match entry {
            Ok(entry_data) => {
                let file_type = entry_data.file_type();
                if !(file_type.is_file() || file_type.is_symlink()) {
                    continue;
                }
                match entry_data.metadata() {
                    Ok(metadata) => {
                        file_count += 1;
                        if file_type.is_file() {
                            total_size += metadata.len();
                        }
                    }
                    Err(e) => tracing::warn!(
                        "Could not get metadata for {}: {}",
                        entry_data.path().display(),
                        e
                    ),
                }
            }
            Err(e) => tracing::warn!("Error traversing directory {}: {}", path.display(), e),
        }
    }
    Ok((file_count, total_size))
}

pub(crate) fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if size >= GB {
        format!("{:.1}GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.1}MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1}KB", size as f64 / KB as f64)
    } else {
        format!("{size}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0MB");
    }

    #[test]
    fn counts_files_under_keg() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/tool"), "12345").unwrap();
        std::fs::write(dir.path().join("README"), "123").unwrap();
        assert_eq!(count_files_and_size(dir.path()).unwrap(), (2, 8));
    }
}
