// rcp-common/src/model/version.rs
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tbz", ".tar.xz", ".txz", ".tar", ".zip", ".gz",
];

/// Version of an installed or installable recipe.
///
/// Kept as the original string so keg directories round-trip exactly. Ordering
/// follows semver when both sides can be read as one (`1.2` is padded to
/// `1.2.0`), and falls back to plain string ordering otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(s: impl Into<String>) -> Self {
        Version(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Detects a version from the trailing segments of a source URL, e.g.
    /// `.../archive/v1.0.0.tar.gz` or `.../tool-2.3.tar.gz`.
    pub fn detect_from_url(url: &str) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.collect();
        segments
            .into_iter()
            .rev()
            .filter(|segment| !segment.is_empty())
            .take(2)
            .find_map(|segment| detect_in_segment(strip_archive_suffix(segment)))
            .map(Version)
    }

    fn as_semver(&self) -> Option<semver::Version> {
        let cleaned = self.0.split('_').next().unwrap_or(&self.0);
        semver::Version::parse(cleaned).ok().or_else(|| {
            let parts: Vec<&str> = cleaned.split('.').collect();
            let padded = match parts.len() {
                1 => format!("{}.0.0", parts[0]),
                2 => format!("{}.{}.0", parts[0], parts[1]),
                _ => return None,
            };
            semver::Version::parse(&padded).ok()
        })
    }
}

fn strip_archive_suffix(segment: &str) -> &str {
    let lower = segment.to_ascii_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| &segment[..segment.len() - suffix.len()])
        .unwrap_or(segment)
}

fn starts_with_version(s: &str) -> Option<&str> {
    let rest = s.strip_prefix(['v', 'V']).unwrap_or(s);
    rest.chars()
        .next()
        .filter(char::is_ascii_digit)
        .map(|_| rest)
}

fn detect_in_segment(stem: &str) -> Option<String> {
    if let Some(v) = starts_with_version(stem) {
        return Some(v.to_string());
    }
    stem.char_indices()
        .filter(|(_, c)| *c == '-' || *c == '_')
        .find_map(|(i, _)| starts_with_version(&stem[i + 1..]))
        .map(str::to_string)
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_semver(), other.as_semver()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_github_archive_tag() {
        let v = Version::detect_from_url("https://github.com/jimmckay/app2xcode/archive/v1.0.0.tar.gz");
        assert_eq!(v, Some(Version::new("1.0.0")));
    }

    #[test]
    fn detects_name_dash_version() {
        assert_eq!(
            Version::detect_from_url("https://example.com/dl/tool-2.3.tar.xz"),
            Some(Version::new("2.3"))
        );
        assert_eq!(
            Version::detect_from_url("https://example.com/dl/foo-bar-1.0.0-beta.zip"),
            Some(Version::new("1.0.0-beta"))
        );
    }

    #[test]
    fn falls_back_to_release_directory() {
        assert_eq!(
            Version::detect_from_url("https://example.com/releases/download/v1.2/tool.tar.gz"),
            Some(Version::new("1.2"))
        );
    }

    #[test]
    fn gives_up_without_digits() {
        assert_eq!(Version::detect_from_url("https://example.com/tool.tar.gz"), None);
    }

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(Version::new("1.10.0") > Version::new("1.9.0"));
        assert!(Version::new("2") > Version::new("1.9"));
        assert!(Version::new("1.0.0_1") > Version::new("1.0.0"));
    }
}
