// rcp/src/cli/install.rs
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use rcp_common::error::{RcpError, Result};
use rcp_common::keg::KegRegistry;
use rcp_common::{Cache, Config};
use rcp_core::{Interpreter, InterpreterOptions};
use tracing::{error, instrument};

use crate::cli::resolve_recipes;
use crate::cli::uninstall::{count_files_and_size, format_size};

#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Recipe files (.rb, .toml, .json) or names from the recipes directory
    #[arg(required = true)]
    recipes: Vec<String>,

    #[arg(long, help = "Replace an existing keg and its bin links")]
    force: bool,

    #[arg(long, help = "Do not run the recipe's test block after installing")]
    skip_test: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config, cache), fields(targets = ?self.recipes))]
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let recipes = resolve_recipes(&self.recipes, config)?;
        let kegs = KegRegistry::new(config.clone());
        let interpreter = Interpreter::with_cache(
            &kegs,
            cache.as_ref().clone(),
            InterpreterOptions {
                overwrite: self.force,
                skip_test: self.skip_test,
            },
        );

        let mut failed: Vec<String> = Vec::new();
        for recipe in &recipes {
            println!("{}{}", "==> ".bold().blue(), format!("Installing {}", recipe.name).bold());
            match interpreter.run(recipe).await {
                Ok(report) => {
                    let (file_count, size_bytes) =
                        count_files_and_size(&report.paths.keg).unwrap_or((0, 0));
                    if !report.archive.checksum.is_verified() {
                        eprintln!(
                            "{} {} has no sha256; installed from an unverified download (sha256 {})",
                            "Warning:".yellow(),
                            recipe.name,
                            report.archive.checksum.digest()
                        );
                    }
                    println!(
                        "✓ Installed {} {} ({} files, {}){}",
                        recipe.name.green(),
                        report.recipe.version(),
                        file_count,
                        format_size(size_bytes),
                        if report.tested { ", test passed" } else { "" }
                    );
                }
                Err(e) => {
                    error!("✖ Failed to install '{}': {}", recipe.name.cyan(), e);
                    eprintln!("✖ {}: {}", recipe.name.cyan(), e.to_string().red());
                    failed.push(recipe.name.clone());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(RcpError::Generic(format!(
                "Install failed for: {}",
                failed.join(", ")
            )))
        }
    }
}
