use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::error::{RcpError, Result};
use super::model::Recipe;
use super::parse::{is_recipe_path, parse_recipe_file};

/// Recipe registry: every known recipe, indexed by its unique name.
#[derive(Debug, Default)]
pub struct Formulary {
    recipes: BTreeMap<String, Arc<Recipe>>,
    sources: BTreeMap<String, PathBuf>,
}

impl Formulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `.rb`, `.toml` and `.json` recipe in `dir`. A missing
    /// directory yields an empty registry; files that fail to parse are skipped
    /// with a warning, but two files declaring the same name are an error.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut formulary = Self::new();
        if !dir.is_dir() {
            debug!(
                "Recipe directory {} does not exist; registry is empty.",
                dir.display()
            );
            return Ok(formulary);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| match entry {
                Ok(e) => Some(e.path()),
                Err(e) => {
                    warn!("Error reading entry in {}: {}", dir.display(), e);
                    None
                }
            })
            .filter(|p| p.is_file() && is_recipe_path(p))
            .collect();
        paths.sort();

        for path in paths {
            match parse_recipe_file(&path) {
                Ok(recipe) => formulary.register(recipe, Some(path))?,
                Err(e) => warn!("Skipping unreadable recipe {}: {}", path.display(), e),
            }
        }
        debug!(
            "Loaded {} recipes from {}",
            formulary.len(),
            dir.display()
        );
        Ok(formulary)
    }

    pub fn register(&mut self, recipe: Recipe, source: Option<PathBuf>) -> Result<()> {
        if recipe.name.trim().is_empty() {
            return Err(RcpError::Registry(format!(
                "Refusing to register a recipe without a name{}",
                source
                    .as_ref()
                    .map(|p| format!(" ({})", p.display()))
                    .unwrap_or_default()
            )));
        }
        if self.recipes.contains_key(&recipe.name) {
            let origin = self
                .sources
                .get(&recipe.name)
                .map(|p| format!(" from {}", p.display()))
                .unwrap_or_default();
            return Err(RcpError::Registry(format!(
                "Recipe '{}' is already registered{}",
                recipe.name, origin
            )));
        }
        if let Some(path) = source {
            self.sources.insert(recipe.name.clone(), path);
        }
        self.recipes.insert(recipe.name.clone(), Arc::new(recipe));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Recipe>> {
        self.recipes.get(name).map(Arc::clone)
    }

    pub fn load_recipe(&self, name: &str) -> Result<Arc<Recipe>> {
        self.get(name)
            .ok_or_else(|| RcpError::NotFound(format!("No recipe named '{name}' is registered")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str) -> Recipe {
        Recipe {
            name: name.to_string(),
            desc: None,
            homepage: None,
            url: format!("https://example.com/{name}-1.0.tar.gz"),
            sha256: String::new(),
            version: None,
            install: Vec::new(),
            test: Vec::new(),
        }
    }

    #[test]
    fn names_are_unique() {
        let mut formulary = Formulary::new();
        formulary.register(recipe("app2xcode"), None).unwrap();
        let err = formulary.register(recipe("app2xcode"), None).unwrap_err();
        assert!(matches!(err, RcpError::Registry(_)));
        assert_eq!(formulary.len(), 1);
        assert!(formulary.load_recipe("app2xcode").is_ok());
        assert!(matches!(
            formulary.load_recipe("missing"),
            Err(RcpError::NotFound(_))
        ));
    }

    #[test]
    fn loads_directory_and_detects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("app2xcode.rb"),
            "class App2xcode < Formula\n  url \"https://example.com/v1.0.0.tar.gz\"\nend\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a recipe").unwrap();
        fs::write(dir.path().join("broken.toml"), "name = ").unwrap();

        let formulary = Formulary::load_dir(dir.path()).unwrap();
        assert_eq!(formulary.names().collect::<Vec<_>>(), vec!["app2xcode"]);

        fs::write(
            dir.path().join("app2xcode.toml"),
            "name = \"app2xcode\"\nurl = \"https://example.com/v1.0.0.tar.gz\"\n",
        )
        .unwrap();
        assert!(matches!(
            Formulary::load_dir(dir.path()),
            Err(RcpError::Registry(_))
        ));
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let formulary = Formulary::load_dir(&dir.path().join("nope")).unwrap();
        assert!(formulary.is_empty());
    }
}
