// rcp/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use rcp_common::error::Result;
use rcp_common::formulary::Formulary;
use rcp_common::model::Recipe;
use rcp_common::parse::{is_recipe_path, parse_recipe_file};
use rcp_common::{Cache, Config};
use tracing::debug;

pub mod audit;
pub mod fetch;
pub mod info;
pub mod install;
pub mod list;
pub mod test;
pub mod uninstall;

use crate::cli::audit::Audit;
use crate::cli::fetch::FetchArgs;
use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::test::TestArgs;
use crate::cli::uninstall::Uninstall;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "rcp", bin_name = "rcp")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Install prefix (overrides RCP_PREFIX)
    #[arg(long, value_name = "DIR", global = true)]
    pub prefix: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate, fetch, install and test recipes
    Install(InstallArgs),
    /// Download and verify recipe sources into the cache
    Fetch(FetchArgs),
    /// Check recipes without running them
    Audit(Audit),
    /// Run the test block of an installed recipe
    Test(TestArgs),
    Uninstall(Uninstall),
    List(List),
    Info(Info),
}

impl Command {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config, cache).await,
            Self::Fetch(command) => command.run(config, cache).await,
            Self::Audit(command) => command.run(config).await,
            Self::Test(command) => command.run(config).await,
            Self::Uninstall(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Info(command) => command.run(config).await,
        }
    }
}

/// Resolves command-line recipe arguments. An argument naming an existing
/// `.rb`, `.toml` or `.json` file is parsed directly; anything else is looked
/// up by name in the recipes directory.
pub fn resolve_recipes(args: &[String], config: &Config) -> Result<Vec<Recipe>> {
    let mut formulary: Option<Formulary> = None;
    let mut recipes = Vec::with_capacity(args.len());
    for arg in args {
        let path = Path::new(arg);
        if is_recipe_path(path) && path.is_file() {
            debug!("Reading recipe file {}", path.display());
            recipes.push(parse_recipe_file(path)?);
            continue;
        }
        if formulary.is_none() {
            formulary = Some(Formulary::load_dir(&config.recipes_dir())?);
        }
        if let Some(registry) = &formulary {
            recipes.push(registry.load_recipe(arg)?.as_ref().clone());
        }
    }
    Ok(recipes)
}
