// rcp-common/src/model/recipe.rs
//! The install recipe and its typed steps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Variables a test argument may reference as `#{name}`.
pub const KNOWN_VARIABLES: &[&str] = &["bin", "libexec", "prefix", "testpath", "version"];

/// A declarative description of how to obtain, install and smoke-test an artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Source archive location.
    pub url: String,
    /// Expected SHA-256 of the source archive; empty means unverified.
    #[serde(default)]
    pub sha256: String,
    /// Explicit version; detected from `url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub install: Vec<InstallStep>,
    #[serde(default)]
    pub test: Vec<TestStep>,
}

impl Recipe {
    pub fn has_checksum(&self) -> bool {
        !self.sha256.trim().is_empty()
    }
}

/// Keg subdirectory a file is placed into.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetDir {
    #[default]
    Bin,
    Libexec,
    Prefix,
}

impl TargetDir {
    /// Path of this directory relative to the keg root.
    pub fn keg_subdir(&self) -> &'static str {
        match self {
            TargetDir::Bin => "bin",
            TargetDir::Libexec => "libexec",
            TargetDir::Prefix => "",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "bin" => Some(TargetDir::Bin),
            "libexec" => Some(TargetDir::Libexec),
            "prefix" => Some(TargetDir::Prefix),
            _ => None,
        }
    }
}

impl fmt::Display for TargetDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetDir::Bin => "bin",
            TargetDir::Libexec => "libexec",
            TargetDir::Prefix => "prefix",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallStep {
    /// Copy `source` (relative to the extracted archive root) into `into`.
    FileCopy {
        source: String,
        #[serde(default)]
        into: TargetDir,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rename: Option<String>,
    },
}

impl InstallStep {
    pub fn file_copy(source: impl Into<String>, into: TargetDir) -> Self {
        InstallStep::FileCopy {
            source: source.into(),
            into,
            rename: None,
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStep::FileCopy {
                source,
                into,
                rename: Some(rename),
            } => write!(f, "{into}.install {source:?} => {rename:?}"),
            InstallStep::FileCopy { source, into, .. } => write!(f, "{into}.install {source:?}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestStep {
    /// Run `argv[0]` with the remaining arguments; success means exit status 0.
    ShellInvoke { argv: Vec<String> },
}

impl TestStep {
    pub fn shell<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TestStep::ShellInvoke {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStep::ShellInvoke { argv } => write!(f, "system {}", argv.join(" ")),
        }
    }
}

/// Returns the names referenced as `#{name}` in `template`.
pub fn template_variables(template: &str) -> std::result::Result<Vec<&str>, String> {
    let mut vars = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("#{") {
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unterminated interpolation in '{template}'"))?;
        vars.push(&after[..end]);
        rest = &after[end + 1..];
    }
    Ok(vars)
}

/// Substitutes every `#{name}` in `template` using `lookup`.
pub fn expand_template<F>(template: &str, lookup: F) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("#{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| format!("unterminated interpolation in '{template}'"))?;
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| format!("unknown variable '#{{{name}}}'"))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_variables() {
        let expanded = expand_template("#{bin}/app2xcode", |name| {
            (name == "bin").then(|| "/opt/rcp/Cellar/app2xcode/1.0.0/bin".to_string())
        })
        .unwrap();
        assert_eq!(expanded, "/opt/rcp/Cellar/app2xcode/1.0.0/bin/app2xcode");
    }

    #[test]
    fn reports_unknown_and_unterminated() {
        assert!(expand_template("#{nope}", |_| None).is_err());
        assert!(template_variables("#{bin").is_err());
        assert_eq!(
            template_variables("#{bin}/x --dir #{testpath}").unwrap(),
            vec!["bin", "testpath"]
        );
    }

    #[test]
    fn toml_steps_use_kind_tags() {
        let recipe: Recipe = toml::from_str(
            r##"
            name = "app2xcode"
            url = "https://github.com/jimmckay/app2xcode/archive/v1.0.0.tar.gz"

            [[install]]
            kind = "file_copy"
            source = "app2xcode"

            [[test]]
            kind = "shell_invoke"
            argv = ["#{bin}/app2xcode", "-v"]
            "##,
        )
        .unwrap();
        assert_eq!(recipe.sha256, "");
        assert_eq!(
            recipe.install,
            vec![InstallStep::file_copy("app2xcode", TargetDir::Bin)]
        );
        assert_eq!(recipe.test, vec![TestStep::shell(["#{bin}/app2xcode", "-v"])]);
    }
}
