// rcp-core/src/interpreter.rs
use rcp_common::cache::Cache;
use rcp_common::error::Result;
use rcp_common::keg::KegRegistry;
use rcp_common::model::{InstalledPaths, LocalArchivePath, Recipe};
use rcp_common::{validate, ValidRecipe};
use rcp_net::fetch;
use tracing::{debug, instrument, warn};

use crate::install::{install, InstallOptions};
use crate::smoke::run_test;

#[derive(Debug, Clone, Copy, Default)]
pub struct InterpreterOptions {
    pub overwrite: bool,
    pub skip_test: bool,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub recipe: ValidRecipe,
    pub archive: LocalArchivePath,
    pub paths: InstalledPaths,
    pub tested: bool,
}

/// Drives a recipe through validate, fetch, install and run_test in order.
/// The first failing step ends the run; earlier steps are not rolled back.
#[derive(Debug)]
pub struct Interpreter<'a> {
    kegs: &'a KegRegistry,
    cache: Cache,
    options: InterpreterOptions,
}

impl<'a> Interpreter<'a> {
    pub fn new(kegs: &'a KegRegistry, options: InterpreterOptions) -> Result<Self> {
        let cache = Cache::new(kegs.config())?;
        Ok(Self::with_cache(kegs, cache, options))
    }

    pub fn with_cache(kegs: &'a KegRegistry, cache: Cache, options: InterpreterOptions) -> Self {
        Self {
            kegs,
            cache,
            options,
        }
    }

    #[instrument(skip_all, fields(recipe = %recipe.name))]
    pub async fn run(&self, recipe: &Recipe) -> Result<InstallReport> {
        let valid = validate(recipe)?;
        debug!("Validated {} {}", valid.name, valid.version());

        let archive = fetch(&valid, &self.cache).await?;
        if !archive.checksum.is_verified() {
            warn!(
                "{} {} is being installed from an unverified download.",
                valid.name,
                valid.version()
            );
        }

        let install_options = InstallOptions {
            overwrite: self.options.overwrite,
        };
        let paths = install(&archive, &valid, self.kegs, &install_options)?;

        let tested = if self.options.skip_test {
            debug!("Skipping tests for {}", valid.name);
            false
        } else {
            run_test(&valid, self.kegs).await?;
            true
        };

        Ok(InstallReport {
            recipe: valid,
            archive,
            paths,
            tested,
        })
    }
}
