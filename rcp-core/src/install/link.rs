// rcp-core/src/install/link.rs
use std::fs;
use std::io;
#[cfg(unix)]
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};

use rcp_common::config::Config;
use rcp_common::error::{InstallError, RcpError, Result};
use tracing::{debug, warn};

use super::map_io;

/// Where a keg executable is linked in the prefix.
pub fn bin_link_path(config: &Config, executable: &Path) -> Option<PathBuf> {
    executable
        .file_name()
        .map(|name| config.bin_dir().join(name))
}

/// Links each keg executable into `<prefix>/bin`. The caller has already
/// cleared conflicting paths.
pub fn link_bin_entries(executables: &[PathBuf], config: &Config) -> Result<Vec<PathBuf>> {
    let bin_dir = config.bin_dir();
    fs::create_dir_all(&bin_dir).map_err(|e| map_io(e, &bin_dir))?;

    let mut links = Vec::with_capacity(executables.len());
    for target in executables {
        let Some(link) = bin_link_path(config, target) else {
            continue;
        };
        create_link(target, &link).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => {
                RcpError::from(InstallError::TargetPathConflict(link.clone()))
            }
            _ => map_io(e, &link),
        })?;
        debug!("  Linked {} -> {}", link.display(), target.display());
        links.push(link);
    }
    Ok(links)
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    unix_fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    fs::copy(target, link).map(|_| ())
}

/// True if something (including a dangling symlink) occupies `path`.
pub fn path_occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

pub fn remove_existing_link_target(path: &Path) -> Result<()> {
    match path.symlink_metadata() {
        Ok(metadata) => {
            debug!(
                "    Removing existing item at link target: {}",
                path.display()
            );
            let file_type = metadata.file_type();
            let remove_result = if file_type.is_dir() && !file_type.is_symlink() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            remove_result.map_err(|e| map_io(e, path))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(map_io(e, path)),
    }
}

/// Removes recorded links that still resolve into `keg`; anything else at
/// those paths belongs to someone else and is left alone.
pub fn unlink_keg_links(links: &[PathBuf], keg: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for link in links {
        match fs::read_link(link) {
            Ok(target) if target.starts_with(keg) => {
                remove_existing_link_target(link)?;
                debug!("  Unlinked {}", link.display());
                removed.push(link.clone());
            }
            Ok(target) => warn!(
                "Leaving {} in place: it now points to {}",
                link.display(),
                target.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("  Link {} already gone", link.display())
            }
            Err(e) => warn!("Leaving {} in place: {}", link.display(), e),
        }
    }
    Ok(removed)
}

/// Links in `<prefix>/bin` pointing into `keg`, for kegs without a receipt.
pub fn find_keg_links(config: &Config, keg: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(config.bin_dir()) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| fs::read_link(p).is_ok_and(|t| t.starts_with(keg)))
        .collect()
}
