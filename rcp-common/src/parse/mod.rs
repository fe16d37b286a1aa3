// rcp-common/src/parse/mod.rs
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{RcpError, Result};
use crate::model::Recipe;

pub mod formula;

pub use formula::parse_formula;

/// On-disk recipe encodings, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeFormat {
    /// Homebrew-style `.rb` formula.
    Formula,
    Toml,
    Json,
}

impl RecipeFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "rb" => Some(RecipeFormat::Formula),
            "toml" => Some(RecipeFormat::Toml),
            "json" => Some(RecipeFormat::Json),
            _ => None,
        }
    }
}

pub fn is_recipe_path(path: &Path) -> bool {
    RecipeFormat::from_path(path).is_some()
}

pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let format = RecipeFormat::from_path(path).ok_or_else(|| {
        RcpError::Generic(format!(
            "Unrecognised recipe file extension: {} (expected .rb, .toml or .json)",
            path.display()
        ))
    })?;
    debug!("Reading {:?} recipe from {}", format, path.display());
    let content = fs::read_to_string(path)?;
    let stem = path.file_stem().and_then(|s| s.to_str());
    parse_recipe_str(&content, format, &path.display().to_string(), stem)
}

/// Parses recipe text. `name_hint` is only consulted for formula sources,
/// which take their name from the file rather than the body.
pub fn parse_recipe_str(
    content: &str,
    format: RecipeFormat,
    origin: &str,
    name_hint: Option<&str>,
) -> Result<Recipe> {
    match format {
        RecipeFormat::Formula => parse_formula(content, origin, name_hint),
        RecipeFormat::Toml => Ok(toml::from_str(content)?),
        RecipeFormat::Json => Ok(serde_json::from_str(content)?),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::{InstallStep, TargetDir};

    #[test]
    fn picks_format_from_extension() {
        assert_eq!(
            RecipeFormat::from_path(&PathBuf::from("a/app2xcode.rb")),
            Some(RecipeFormat::Formula)
        );
        assert_eq!(
            RecipeFormat::from_path(&PathBuf::from("x.toml")),
            Some(RecipeFormat::Toml)
        );
        assert_eq!(RecipeFormat::from_path(&PathBuf::from("x.yaml")), None);
        assert_eq!(RecipeFormat::from_path(&PathBuf::from("noext")), None);
    }

    #[test]
    fn file_stem_names_formula() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my-tool.rb");
        fs::write(
            &path,
            "class SomethingElse < Formula\n  url \"https://example.com/t-1.0.tar.gz\"\n  def install\n    bin.install \"t\"\n  end\nend\n",
        )
        .unwrap();
        let recipe = parse_recipe_file(&path).unwrap();
        assert_eq!(recipe.name, "my-tool");
        assert_eq!(recipe.install, vec![InstallStep::file_copy("t", TargetDir::Bin)]);
    }

    #[test]
    fn json_recipes_deserialize() {
        let recipe = parse_recipe_str(
            r#"{"name":"t","url":"file:///tmp/t-1.0.tar.gz","install":[{"kind":"file_copy","source":"t","into":"libexec","rename":"tt"}]}"#,
            RecipeFormat::Json,
            "inline",
            None,
        )
        .unwrap();
        assert_eq!(
            recipe.install,
            vec![InstallStep::FileCopy {
                source: "t".to_string(),
                into: TargetDir::Libexec,
                rename: Some("tt".to_string()),
            }]
        );
        assert!(recipe.test.is_empty());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = parse_recipe_str("name = ", RecipeFormat::Toml, "bad.toml", None).unwrap_err();
        assert!(matches!(err, RcpError::Toml(_)));
    }
}
