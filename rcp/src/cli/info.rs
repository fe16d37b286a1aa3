// rcp/src/cli/info.rs
use clap::Args;
use colored::Colorize;
use rcp_common::config::Config;
use rcp_common::error::{RcpError, Result};
use rcp_common::keg::KegRegistry;
use rcp_common::validate;

use crate::cli::resolve_recipes;

#[derive(Args, Debug)]
pub struct Info {
    /// Recipe file or name
    pub recipe: String,

    /// Print the recipe as JSON
    #[arg(long)]
    pub json: bool,
}

impl Info {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let recipe = resolve_recipes(std::slice::from_ref(&self.recipe), config)?
            .pop()
            .ok_or_else(|| RcpError::NotFound(self.recipe.clone()))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&recipe)?);
            return Ok(());
        }

        let valid = validate(&recipe);
        let version = valid
            .as_ref()
            .map(|v| v.version().to_string())
            .unwrap_or_else(|_| "?".to_string());
        println!("{} {}", recipe.name.green().bold(), version);
        if let Some(desc) = &recipe.desc {
            println!("{desc}");
        }
        if let Some(homepage) = &recipe.homepage {
            println!("{homepage}");
        }
        println!("{} {}", "From:".bold(), recipe.url);
        if recipe.has_checksum() {
            println!("{} {}", "SHA256:".bold(), recipe.sha256);
        } else {
            println!("{} {}", "SHA256:".bold(), "none (download is not verified)".yellow());
        }
        if !recipe.install.is_empty() {
            println!("{}", "Install:".bold());
            for step in &recipe.install {
                println!("  {step}");
            }
        }
        if !recipe.test.is_empty() {
            println!("{}", "Test:".bold());
            for step in &recipe.test {
                println!("  {step}");
            }
        }
        if let Err(e) = &valid {
            println!("{} {}", "Invalid:".red().bold(), e);
        }

        let kegs = KegRegistry::new(config.clone());
        match kegs.get_installed_keg(&recipe.name)? {
            Some(keg) => println!(
                "{} {} ({})",
                "Installed:".bold(),
                keg.version,
                keg.path.display()
            ),
            None => println!("{} no", "Installed:".bold()),
        }
        Ok(())
    }
}
