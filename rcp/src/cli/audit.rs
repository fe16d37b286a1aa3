// rcp/src/cli/audit.rs
use clap::Args;
use colored::Colorize;
use rcp_common::error::{RcpError, Result};
use rcp_common::model::Recipe;
use rcp_common::{validate, Config};

use crate::cli::resolve_recipes;

#[derive(Debug, Args)]
pub struct Audit {
    #[arg(required = true)]
    recipes: Vec<String>,
}

/// Non-fatal findings for a recipe that already passed validation.
fn lint(recipe: &Recipe) -> Vec<String> {
    let mut notes = Vec::new();
    if !recipe.has_checksum() {
        notes.push("no sha256: downloads cannot be verified".to_string());
    }
    if recipe.desc.as_deref().map_or(true, |d| d.trim().is_empty()) {
        notes.push("missing desc".to_string());
    }
    match recipe.homepage.as_deref() {
        None => notes.push("missing homepage".to_string()),
        Some(h) if !h.starts_with("https://") => {
            notes.push(format!("homepage '{h}' should use https"))
        }
        Some(_) => {}
    }
    if recipe.test.is_empty() {
        notes.push("no test block".to_string());
    }
    notes
}

impl Audit {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let mut invalid = 0usize;
        for recipe in resolve_recipes(&self.recipes, config)? {
            match validate(&recipe) {
                Ok(valid) => {
                    let notes = lint(&recipe);
                    if notes.is_empty() {
                        println!("✓ {} {}", valid.name.green(), valid.version());
                    } else {
                        println!("! {} {}", valid.name.yellow(), valid.version());
                        for note in notes {
                            println!("  - {note}");
                        }
                    }
                }
                Err(e) => {
                    invalid += 1;
                    println!("✖ {}: {}", recipe.name.cyan(), e.to_string().red());
                }
            }
        }
        if invalid > 0 {
            return Err(RcpError::Generic(format!(
                "{invalid} recipe(s) failed validation"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rcp_common::model::{InstallStep, TargetDir, TestStep};

    use super::*;

    #[test]
    fn flags_missing_checksum_and_metadata() {
        let recipe = Recipe {
            name: "app2xcode".to_string(),
            desc: None,
            homepage: Some("http://example.com".to_string()),
            url: "https://github.com/jimmckay/app2xcode/archive/v1.0.0.tar.gz".to_string(),
            sha256: String::new(),
            version: None,
            install: vec![InstallStep::file_copy("app2xcode", TargetDir::Bin)],
            test: vec![TestStep::shell(["#{bin}/app2xcode", "-v"])],
        };
        let notes = lint(&recipe);
        assert_eq!(notes.len(), 3);
        assert!(notes[0].contains("sha256"));
    }
}
