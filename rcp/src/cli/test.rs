// rcp/src/cli/test.rs
use clap::Args;
use colored::Colorize;
use rcp_common::error::{RcpError, Result};
use rcp_common::keg::KegRegistry;
use rcp_common::validation::validate_name;
use rcp_common::{validate, Config};
use rcp_core::run_test;
use tracing::debug;

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Name of an installed recipe
    pub name: String,
}

impl TestArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        validate_name(&self.name)?;
        let kegs = KegRegistry::new(config.clone());
        let keg = kegs
            .get_installed_keg(&self.name)?
            .ok_or_else(|| RcpError::NotFound(format!("'{}' is not installed", self.name)))?;

        // The receipt carries the recipe exactly as it was installed; pin its
        // version to the keg so the test runs against this install.
        let mut recipe = kegs.read_receipt(&keg)?.recipe;
        recipe.version = Some(keg.version.to_string());
        let valid = validate(&recipe)?;
        debug!("Testing {} {} at {}", valid.name, keg.version, keg.path.display());

        run_test(&valid, &kegs).await?;
        println!("✓ {} {} test passed", self.name.green(), keg.version);
        Ok(())
    }
}
