// rcp-core/src/install/mod.rs
//! Places a fetched source archive into its keg and links its executables.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rcp_common::error::{InstallError, RcpError, Result};
use rcp_common::keg::KegRegistry;
use rcp_common::model::{InstallReceipt, InstallStep, InstalledPaths, LocalArchivePath, TargetDir};
use rcp_common::ValidRecipe;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub mod extract;
pub mod link;

use extract::{content_root, extract_archive, ArchiveKind};
use link::{bin_link_path, link_bin_entries, path_occupied, remove_existing_link_target};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Replace an existing keg and existing `bin` links instead of failing.
    pub overwrite: bool,
}

/// Permission problems surface as `InstallError::PermissionDenied`; other IO
/// errors pass through unchanged.
pub(crate) fn map_io(err: io::Error, path: &Path) -> RcpError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        InstallError::PermissionDenied(path.to_path_buf()).into()
    } else {
        err.into()
    }
}

struct PlannedCopy<'a> {
    source: &'a str,
    into: TargetDir,
    dest: PathBuf,
}

fn plan_copies<'a>(recipe: &'a ValidRecipe, keg: &Path) -> Result<Vec<PlannedCopy<'a>>> {
    let mut plan: Vec<PlannedCopy<'a>> = Vec::with_capacity(recipe.install.len());
    for step in &recipe.install {
        let InstallStep::FileCopy {
            source,
            into,
            rename,
        } = step;
        let file_name = match rename {
            Some(name) => PathBuf::from(name),
            None => Path::new(source)
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| RcpError::Generic(format!("cannot name install target for '{source}'")))?,
        };
        let dest = keg.join(into.keg_subdir()).join(file_name);
        if plan.iter().any(|p| p.dest == dest) {
            return Err(InstallError::TargetPathConflict(dest).into());
        }
        plan.push(PlannedCopy {
            source,
            into: *into,
            dest,
        });
    }
    Ok(plan)
}

/// Installs `archive` for `recipe` into `<cellar>/<name>/<version>`.
///
/// Every conflicting path is checked before anything is written. Without
/// `overwrite`, an existing keg or `bin` link is a `TargetPathConflict`.
pub fn install(
    archive: &LocalArchivePath,
    recipe: &ValidRecipe,
    kegs: &KegRegistry,
    options: &InstallOptions,
) -> Result<InstalledPaths> {
    let config = kegs.config();
    let keg = kegs.get_keg_path(&recipe.name, recipe.version());
    debug!(
        "Installing {} {} from {} into {}",
        recipe.name,
        recipe.version(),
        archive.path.display(),
        keg.display()
    );

    let plan = plan_copies(recipe, &keg)?;
    let link_paths: Vec<PathBuf> = plan
        .iter()
        .filter(|p| p.into == TargetDir::Bin)
        .filter_map(|p| bin_link_path(config, &p.dest))
        .collect();

    let conflicts: Vec<&Path> = std::iter::once(keg.as_path())
        .chain(link_paths.iter().map(PathBuf::as_path))
        .filter(|p| path_occupied(p))
        .collect();
    if let Some(first) = conflicts.first() {
        if !options.overwrite {
            return Err(InstallError::TargetPathConflict(first.to_path_buf()).into());
        }
        for path in &conflicts {
            warn!("Overwriting existing {}", path.display());
            remove_existing_link_target(path)?;
        }
    }

    let tmp_dir = config.tmp_dir();
    fs::create_dir_all(&tmp_dir).map_err(|e| map_io(e, &tmp_dir))?;
    let stage = tempfile::Builder::new()
        .prefix(&format!("{}-", recipe.name))
        .tempdir_in(&tmp_dir)
        .map_err(|e| map_io(e, &tmp_dir))?;

    let extraction_failed = |reason: String| InstallError::ExtractionFailed {
        archive: archive.path.clone(),
        reason,
    };
    let kind = ArchiveKind::detect(&archive.path).map_err(|e| extraction_failed(e.to_string()))?;
    extract_archive(&archive.path, stage.path(), kind, &bare_file_name(recipe))
        .map_err(extraction_failed)?;
    let root = content_root(stage.path()).map_err(|e| map_io(e, stage.path()))?;

    // Every source must exist and resolve inside the staged tree before the
    // keg is created, so a failed install leaves nothing behind.
    let staged = fs::canonicalize(stage.path()).map_err(|e| map_io(e, stage.path()))?;
    let mut sources = Vec::with_capacity(plan.len());
    for copy in &plan {
        let src = root.join(copy.source);
        if !path_occupied(&src) {
            return Err(extraction_failed(format!("'{}' not found in archive", copy.source)).into());
        }
        match fs::canonicalize(&src) {
            Ok(resolved) if resolved.starts_with(&staged) => {}
            Ok(resolved) => {
                return Err(extraction_failed(format!(
                    "'{}' resolves outside the archive ({})",
                    copy.source,
                    resolved.display()
                ))
                .into())
            }
            Err(e) => {
                return Err(extraction_failed(format!("'{}' is unreadable: {}", copy.source, e)).into())
            }
        }
        sources.push(src);
    }

    fs::create_dir_all(&keg).map_err(|e| map_io(e, &keg))?;
    let mut files = Vec::new();
    for (copy, src) in plan.iter().zip(&sources) {
        if let Some(parent) = copy.dest.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(e, parent))?;
        }
        if src.is_dir() {
            copy_dir(src, &copy.dest, &mut files)?;
        } else {
            fs::copy(src, &copy.dest).map_err(|e| map_io(e, &copy.dest))?;
            files.push(copy.dest.clone());
        }
        debug!("  Installed {} -> {}", copy.source, copy.dest.display());
    }

    let executables: Vec<PathBuf> = plan
        .iter()
        .filter(|p| p.into == TargetDir::Bin)
        .map(|p| p.dest.clone())
        .collect();
    let links = link_bin_entries(&executables, config)?;

    let paths = InstalledPaths {
        keg: keg.clone(),
        files,
        links,
    };
    let receipt = InstallReceipt::new(recipe.recipe(), recipe.version(), &archive.checksum, &paths);
    kegs.write_receipt(&keg, &receipt)?;
    debug!(
        "Installed {} file(s) and {} link(s) for {}",
        paths.files.len(),
        paths.links.len(),
        recipe.name
    );
    Ok(paths)
}

/// Name a non-archive download is staged under: the last URL path segment.
fn bare_file_name(recipe: &ValidRecipe) -> String {
    recipe
        .url
        .split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|s| !s.is_empty())
        .unwrap_or(recipe.name.as_str())
        .to_string()
}

fn copy_dir(src: &Path, dest: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| map_io(e.into(), src))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| RcpError::Generic(format!("walked outside {}: {}", src.display(), e)))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| map_io(e, &target))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| map_io(e, &target))?;
            files.push(target);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rcp_common::model::{ChecksumStatus, Recipe};
    use rcp_common::{validate, Config};

    use super::*;

    fn archive(dir: &Path, entries: &[(&str, &str, u32)]) -> LocalArchivePath {
        let path = dir.join("tool--1.0.0--v1.0.0.tar.gz");
        let mut builder =
            tar::Builder::new(GzEncoder::new(File::create(&path).unwrap(), Compression::default()));
        for (name, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            builder
                .append_data(&mut header, format!("tool-1.0.0/{name}"), data.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        LocalArchivePath {
            path,
            checksum: ChecksumStatus::Unverified {
                actual: "0".repeat(64),
            },
        }
    }

    fn recipe(install: Vec<InstallStep>) -> ValidRecipe {
        validate(&Recipe {
            name: "tool".to_string(),
            desc: None,
            homepage: None,
            url: "https://example.com/tool/v1.0.0.tar.gz".to_string(),
            sha256: String::new(),
            version: None,
            install,
            test: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn copies_renames_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let kegs = KegRegistry::new(Config::with_prefix(dir.path().join("prefix")).unwrap());
        let archive = archive(
            dir.path(),
            &[
                ("tool", "#!/bin/sh\n", 0o755),
                ("share/data.txt", "data", 0o644),
                ("share/more/x.txt", "x", 0o644),
            ],
        );
        let recipe = recipe(vec![
            InstallStep::file_copy("tool", TargetDir::Bin),
            InstallStep::FileCopy {
                source: "share".to_string(),
                into: TargetDir::Libexec,
                rename: Some("assets".to_string()),
            },
        ]);

        let paths = install(&archive, &recipe, &kegs, &InstallOptions::default()).unwrap();
        let keg = dir.path().join("prefix/Cellar/tool/1.0.0");
        assert_eq!(paths.keg, keg);
        assert!(paths.files.contains(&keg.join("bin/tool")));
        assert!(paths.files.contains(&keg.join("libexec/assets/more/x.txt")));
        assert_eq!(paths.links, vec![dir.path().join("prefix/bin/tool")]);
        assert!(keg.join(".rcp/INSTALL_RECEIPT.json").is_file());
        assert!(!dir.path().join("prefix/tmp").read_dir().unwrap().any(|_| true));
    }

    #[test]
    fn missing_source_is_extraction_failure() {
        let dir = tempfile::tempdir().unwrap();
        let kegs = KegRegistry::new(Config::with_prefix(dir.path().join("prefix")).unwrap());
        let archive = archive(dir.path(), &[("README", "hi", 0o644)]);
        let recipe = recipe(vec![InstallStep::file_copy("tool", TargetDir::Bin)]);

        for _ in 0..2 {
            let err = install(&archive, &recipe, &kegs, &InstallOptions::default()).unwrap_err();
            assert!(
                matches!(err, RcpError::Install(InstallError::ExtractionFailed { .. })),
                "unexpected error: {err:?}"
            );
            assert!(!kegs.get_keg_path("tool", recipe.version()).exists());
            assert!(kegs.get_installed_keg("tool").unwrap().is_none());
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_source_outside_archive_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let kegs = KegRegistry::new(Config::with_prefix(dir.path().join("prefix")).unwrap());
        let secret = dir.path().join("host-secret.txt");
        fs::write(&secret, "HOST SECRET").unwrap();

        let path = dir.path().join("tool--1.0.0--v1.0.0.tar.gz");
        let mut builder =
            tar::Builder::new(GzEncoder::new(File::create(&path).unwrap(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder
            .append_link(&mut header, "tool-1.0.0/tool", &secret)
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        let archive = LocalArchivePath {
            path,
            checksum: ChecksumStatus::Unverified {
                actual: "0".repeat(64),
            },
        };
        let recipe = recipe(vec![InstallStep::file_copy("tool", TargetDir::Bin)]);

        let err = install(&archive, &recipe, &kegs, &InstallOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            RcpError::Install(InstallError::ExtractionFailed { .. })
        ));
        let keg = kegs.get_keg_path("tool", recipe.version());
        assert!(!keg.exists());
        assert!(!dir.path().join("prefix/bin/tool").exists());
    }

    #[cfg(unix)]
    #[test]
    fn read_only_cellar_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_prefix(dir.path().join("prefix")).unwrap();
        let cellar = config.cellar_dir();
        fs::create_dir_all(&cellar).unwrap();
        fs::set_permissions(&cellar, fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits do not bind a privileged user.
        if fs::write(cellar.join(".write-check"), "").is_ok() {
            fs::set_permissions(&cellar, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let kegs = KegRegistry::new(config);
        let archive = archive(dir.path(), &[("tool", "#!/bin/sh\n", 0o755)]);
        let recipe = recipe(vec![InstallStep::file_copy("tool", TargetDir::Bin)]);
        let result = install(&archive, &recipe, &kegs, &InstallOptions::default());
        fs::set_permissions(&cellar, fs::Permissions::from_mode(0o755)).unwrap();

        match result {
            Err(RcpError::Install(InstallError::PermissionDenied(path))) => {
                assert!(path.starts_with(&cellar), "{}", path.display());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn duplicate_destinations_conflict_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let kegs = KegRegistry::new(Config::with_prefix(dir.path().join("prefix")).unwrap());
        let archive = archive(dir.path(), &[("a/tool", "1", 0o755), ("b/tool", "2", 0o755)]);
        let recipe = recipe(vec![
            InstallStep::file_copy("a/tool", TargetDir::Bin),
            InstallStep::file_copy("b/tool", TargetDir::Bin),
        ]);

        let err = install(&archive, &recipe, &kegs, &InstallOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            RcpError::Install(InstallError::TargetPathConflict(_))
        ));
        assert!(!kegs.get_keg_path("tool", recipe.version()).exists());
    }
}
