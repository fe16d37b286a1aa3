// rcp/src/cli/fetch.rs
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use rcp_common::error::Result;
use rcp_common::{validate, Cache, Config};
use rcp_net::fetch;

use crate::cli::resolve_recipes;

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[arg(required = true)]
    recipes: Vec<String>,
}

impl FetchArgs {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        for recipe in resolve_recipes(&self.recipes, config)? {
            let valid = validate(&recipe)?;
            let local = fetch(&valid, &cache).await?;
            let status = if local.checksum.is_verified() {
                "verified".green()
            } else {
                "UNVERIFIED".yellow()
            };
            println!(
                "{} {}: {} (sha256 {}, {})",
                valid.name.bold(),
                valid.version(),
                local.path.display(),
                local.checksum.digest(),
                status
            );
        }
        Ok(())
    }
}
