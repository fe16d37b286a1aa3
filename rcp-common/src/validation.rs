// rcp-common/src/validation.rs
use std::ops::Deref;
use std::path::{Component, Path};

use tracing::{debug, warn};
use url::Url;

use crate::error::ValidationError;
use crate::model::recipe::{template_variables, KNOWN_VARIABLES};
use crate::model::{InstallStep, Recipe, TestStep, Version};

const SHA256_HEX_LEN: usize = 64;

/// A recipe that passed [`validate`], together with its resolved version.
///
/// Only `validate` constructs this, so every later step can rely on a
/// well-formed name, URL, checksum and step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecipe {
    recipe: Recipe,
    version: Version,
}

impl ValidRecipe {
    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl Deref for ValidRecipe {
    type Target = Recipe;

    fn deref(&self) -> &Recipe {
        &self.recipe
    }
}

pub fn validate(recipe: &Recipe) -> Result<ValidRecipe, ValidationError> {
    debug!("Validating recipe '{}'", recipe.name);
    validate_name(&recipe.name)?;
    validate_url(&recipe.url)?;
    validate_checksum(&recipe.sha256)?;

    for (index, step) in recipe.install.iter().enumerate() {
        validate_install_step(index, step)?;
    }
    for (index, step) in recipe.test.iter().enumerate() {
        validate_test_step(index, step)?;
    }

    let version = match recipe.version.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => {
            if v.contains(['/', '\\']) || v == "." || v == ".." {
                return Err(ValidationError::UndetectableVersion(v.to_string()));
            }
            Version::new(v)
        }
        _ => Version::detect_from_url(&recipe.url)
            .ok_or_else(|| ValidationError::UndetectableVersion(recipe.url.clone()))?,
    };

    if recipe.install.is_empty() {
        warn!("Recipe '{}' declares no install steps.", recipe.name);
    }
    if !recipe.has_checksum() {
        debug!(
            "Recipe '{}' declares no sha256; the download will not be verified.",
            recipe.name
        );
    }

    Ok(ValidRecipe {
        recipe: recipe.clone(),
        version,
    })
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || "-_.+@".contains(c);
    if name.starts_with('.') || !name.chars().all(allowed) {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Validates a source URL, accepting only the `https` and `file` schemes.
pub fn validate_url(url_str: &str) -> Result<(), ValidationError> {
    let url = Url::parse(url_str).map_err(|e| ValidationError::MalformedUrl {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "https" => {
            if url.host_str().map_or(true, str::is_empty) {
                return Err(ValidationError::MalformedUrl {
                    url: url_str.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            Ok(())
        }
        "file" => url
            .to_file_path()
            .map(|_| ())
            .map_err(|_| ValidationError::MalformedUrl {
                url: url_str.to_string(),
                reason: "not an absolute local path".to_string(),
            }),
        other => Err(ValidationError::UnsupportedScheme {
            url: url_str.to_string(),
            scheme: other.to_string(),
        }),
    }
}

/// An empty checksum is allowed; anything else must be a SHA-256 hex digest.
pub fn validate_checksum(sha256: &str) -> Result<(), ValidationError> {
    let trimmed = sha256.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.len() != SHA256_HEX_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::MalformedChecksum(sha256.to_string()));
    }
    Ok(())
}

fn is_safe_relative(path: &str) -> bool {
    let p = Path::new(path);
    !path.is_empty()
        && p.components().next().is_some()
        && p
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate_install_step(index: usize, step: &InstallStep) -> Result<(), ValidationError> {
    let InstallStep::FileCopy { source, rename, .. } = step;
    if !is_safe_relative(source) || source.trim_matches(['.', '/']).is_empty() {
        return Err(ValidationError::InvalidInstallStep {
            index,
            reason: format!("source '{source}' must be a relative path inside the archive"),
        });
    }
    if let Some(rename) = rename {
        let single = Path::new(rename).components().count() == 1;
        if !is_safe_relative(rename) || !single || rename == "." {
            return Err(ValidationError::InvalidInstallStep {
                index,
                reason: format!("rename target '{rename}' must be a plain file name"),
            });
        }
    }
    Ok(())
}

fn validate_test_step(index: usize, step: &TestStep) -> Result<(), ValidationError> {
    let TestStep::ShellInvoke { argv } = step;
    let program = argv.first().map(|s| s.trim()).unwrap_or_default();
    if program.is_empty() {
        return Err(ValidationError::InvalidTestStep {
            index,
            reason: "command is empty".to_string(),
        });
    }
    for arg in argv {
        let vars = template_variables(arg)
            .map_err(|reason| ValidationError::InvalidTestStep { index, reason })?;
        if let Some(unknown) = vars.iter().find(|v| !KNOWN_VARIABLES.contains(v)) {
            return Err(ValidationError::InvalidTestStep {
                index,
                reason: format!("unknown interpolation '#{{{unknown}}}'"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetDir;

    fn app2xcode() -> Recipe {
        Recipe {
            name: "app2xcode".to_string(),
            desc: Some("Add a signed app to XCode's organizer".to_string()),
            homepage: Some("https://github.com/jimmckay/app2xcode/".to_string()),
            url: "https://github.com/jimmckay/app2xcode/archive/v1.0.0.tar.gz".to_string(),
            sha256: String::new(),
            version: None,
            install: vec![InstallStep::file_copy("app2xcode", TargetDir::Bin)],
            test: vec![TestStep::shell(["#{bin}/app2xcode", "-v"])],
        }
    }

    #[test]
    fn accepts_unverified_recipe_and_detects_version() {
        let valid = validate(&app2xcode()).unwrap();
        assert_eq!(valid.version(), &Version::new("1.0.0"));
        assert_eq!(valid.name, "app2xcode");
    }

    #[test]
    fn rejects_empty_and_path_like_names() {
        let mut recipe = app2xcode();
        recipe.name = "  ".to_string();
        assert_eq!(validate(&recipe), Err(ValidationError::EmptyName));
        recipe.name = "../evil".to_string();
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::InvalidName(_))
        ));
    }

    #[test]
    fn rejects_bad_urls() {
        let mut recipe = app2xcode();
        recipe.url = "not a url".to_string();
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::MalformedUrl { .. })
        ));
        recipe.url = "ftp://example.com/app-1.0.tar.gz".to_string();
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn checksum_must_be_sha256_hex_when_present() {
        assert!(validate_checksum("").is_ok());
        assert!(validate_checksum(&"a".repeat(64)).is_ok());
        assert!(validate_checksum(&"A1".repeat(32)).is_ok());
        assert!(matches!(
            validate_checksum("deadbeef"),
            Err(ValidationError::MalformedChecksum(_))
        ));
        assert!(matches!(
            validate_checksum(&"z".repeat(64)),
            Err(ValidationError::MalformedChecksum(_))
        ));
    }

    #[test]
    fn rejects_escaping_install_sources() {
        let mut recipe = app2xcode();
        recipe.install = vec![InstallStep::file_copy("../../etc/passwd", TargetDir::Bin)];
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::InvalidInstallStep { index: 0, .. })
        ));
        recipe.install = vec![InstallStep::FileCopy {
            source: "app2xcode".to_string(),
            into: TargetDir::Bin,
            rename: Some("sub/dir".to_string()),
        }];
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::InvalidInstallStep { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_unknown_interpolation_in_tests() {
        let mut recipe = app2xcode();
        recipe.test.push(TestStep::shell(["#{HOME}/x"]));
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::InvalidTestStep { index: 1, .. })
        ));
    }

    #[test]
    fn explicit_version_overrides_detection() {
        let mut recipe = app2xcode();
        recipe.url = "https://example.com/download/latest.tar.gz".to_string();
        assert!(matches!(
            validate(&recipe),
            Err(ValidationError::UndetectableVersion(_))
        ));
        recipe.version = Some("2024.1".to_string());
        assert_eq!(validate(&recipe).unwrap().version().as_str(), "2024.1");
    }
}
