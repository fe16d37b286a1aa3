// rcp/src/cli/list.rs
use std::collections::BTreeMap;

use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use rcp_common::config::Config;
use rcp_common::error::Result;
use rcp_common::keg::{InstalledKeg, KegRegistry};
use tracing::warn;

#[derive(Args, Debug)]
pub struct List {
    /// Show all installed versions, not just the latest for each name
    #[arg(long)]
    pub all: bool,
}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let kegs = KegRegistry::new(config.clone());
        let installed = kegs.list_installed_kegs()?;

        let shown: Vec<&InstalledKeg> = if self.all {
            installed.iter().collect()
        } else {
            // list_installed_kegs is sorted oldest-first per name.
            let mut latest: BTreeMap<&str, &InstalledKeg> = BTreeMap::new();
            for keg in &installed {
                latest.insert(keg.name.as_str(), keg);
            }
            latest.into_values().collect()
        };

        if shown.is_empty() {
            println!("{}", "0 recipes installed".yellow());
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Checksum").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
        ]));
        for keg in &shown {
            let (checksum, installed_at) = match kegs.read_receipt(keg) {
                Ok(receipt) if receipt.checksum.is_verified() => {
                    (Cell::new("verified").style_spec("Fg"), receipt.installed_at)
                }
                Ok(receipt) => (
                    Cell::new("unverified").style_spec("Fy"),
                    receipt.installed_at,
                ),
                Err(e) => {
                    warn!("{} {}: {}", keg.name, keg.version, e);
                    (Cell::new("?"), "-".to_string())
                }
            };
            table.add_row(Row::new(vec![
                Cell::new(&keg.name).style_spec("Fb"),
                Cell::new(keg.version.as_str()),
                checksum,
                Cell::new(&installed_at),
            ]));
        }
        table.printstd();
        println!("{} recipe(s) shown", shown.len());
        Ok(())
    }
}
