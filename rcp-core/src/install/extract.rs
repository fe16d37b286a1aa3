// rcp-core/src/install/extract.rs
use std::fs::{self, File};
use std::io::{self, Read, Seek};
#[cfg(unix)]
use std::os::unix::fs as unix_fs;
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, error, warn};
use xz2::read::XzDecoder;
use zip::read::ZipArchive;

type ExtractResult<T> = std::result::Result<T, String>;

/// How a fetched source file is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
    /// Not an archive; the file itself is the payload.
    Bare,
}

impl ArchiveKind {
    /// Detects the kind from the file name, falling back to sniffing the
    /// file's magic bytes.
    pub fn detect(path: &Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(kind) = Self::from_file_name(&name) {
            return Ok(kind);
        }

        let kind = match infer::get_from_path(path)?.map(|t| t.mime_type()) {
            Some("application/gzip") => ArchiveKind::TarGz,
            Some("application/x-bzip2") => ArchiveKind::TarBz2,
            Some("application/x-xz") => ArchiveKind::TarXz,
            Some("application/x-tar") => ArchiveKind::Tar,
            Some("application/zip") => ArchiveKind::Zip,
            _ => ArchiveKind::Bare,
        };
        debug!("Sniffed {} as {:?}", path.display(), kind);
        Ok(kind)
    }

    fn from_file_name(name: &str) -> Option<Self> {
        const SUFFIXES: &[(&str, ArchiveKind)] = &[
            (".tar.gz", ArchiveKind::TarGz),
            (".tgz", ArchiveKind::TarGz),
            (".tar.bz2", ArchiveKind::TarBz2),
            (".tbz", ArchiveKind::TarBz2),
            (".tbz2", ArchiveKind::TarBz2),
            (".tar.xz", ArchiveKind::TarXz),
            (".txz", ArchiveKind::TarXz),
            (".tar", ArchiveKind::Tar),
            (".zip", ArchiveKind::Zip),
        ];
        SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, kind)| *kind)
    }
}

/// Unpacks `archive_path` into `target_dir`. A `Bare` payload is copied in as
/// `bare_name`. Errors are returned as a human-readable reason.
pub fn extract_archive(
    archive_path: &Path,
    target_dir: &Path,
    kind: ArchiveKind,
    bare_name: &str,
) -> ExtractResult<()> {
    debug!(
        "Extracting '{}' ({:?}) to '{}'",
        archive_path.display(),
        kind,
        target_dir.display()
    );

    fs::create_dir_all(target_dir).map_err(|e| {
        format!(
            "failed to create target directory {}: {}",
            target_dir.display(),
            e
        )
    })?;

    if kind == ArchiveKind::Bare {
        let dest = target_dir.join(bare_name);
        fs::copy(archive_path, &dest)
            .map_err(|e| format!("failed to stage {}: {}", dest.display(), e))?;
        return Ok(());
    }

    let file = File::open(archive_path)
        .map_err(|e| format!("failed to open archive {}: {}", archive_path.display(), e))?;

    match kind {
        ArchiveKind::Zip => extract_zip_archive(file, target_dir, archive_path),
        ArchiveKind::TarGz => extract_tar_archive(GzDecoder::new(file), target_dir, archive_path),
        ArchiveKind::TarBz2 => extract_tar_archive(BzDecoder::new(file), target_dir, archive_path),
        ArchiveKind::TarXz => extract_tar_archive(XzDecoder::new(file), target_dir, archive_path),
        ArchiveKind::Tar => extract_tar_archive(file, target_dir, archive_path),
        ArchiveKind::Bare => Ok(()),
    }
}

/// The directory install steps resolve against: the single top-level
/// directory of the extracted tree if there is exactly one, else the tree itself.
pub fn content_root(stage_dir: &Path) -> io::Result<PathBuf> {
    let mut entries = fs::read_dir(stage_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n != "pax_global_header" && n != "__MACOSX")
        });
    match (entries.next(), entries.next()) {
        (Some(only), None) if only.is_dir() => {
            debug!("Descending into single root directory {}", only.display());
            Ok(only)
        }
        _ => Ok(stage_dir.to_path_buf()),
    }
}

/// Rejects absolute paths and `..` so nothing lands outside the target.
fn checked_join(target_dir: &Path, entry_path: &Path) -> ExtractResult<PathBuf> {
    let mut out = target_dir.to_path_buf();
    for comp in entry_path.components() {
        match comp {
            Component::Normal(p) => out.push(p),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("unsafe '..' in entry {}", entry_path.display()))
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(format!("absolute entry path {}", entry_path.display()))
            }
        }
    }
    Ok(out)
}

/// Whether a symlink stored at `entry_path` (relative to the archive root)
/// with target `link_target` resolves to a location inside the archive.
fn link_stays_inside(entry_path: &Path, link_target: &Path) -> bool {
    let mut depth: Vec<&std::ffi::OsStr> = Vec::new();
    if let Some(parent) = entry_path.parent() {
        for comp in parent.components() {
            match comp {
                Component::Normal(p) => depth.push(p),
                Component::CurDir => {}
                _ => return false,
            }
        }
    }
    for comp in link_target.components() {
        match comp {
            Component::Normal(p) => depth.push(p),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth.pop().is_none() {
                    return false;
                }
            }
            Component::Prefix(_) | Component::RootDir => return false,
        }
    }
    true
}

fn extract_tar_archive<R: Read>(
    reader: R,
    target_dir: &Path,
    archive_path_for_log: &Path,
) -> ExtractResult<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut errors: Vec<String> = Vec::new();
    let entries = archive
        .entries()
        .map_err(|e| format!("not a readable tar stream: {e}"))?;

    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| format!("error reading tar entry: {e}"))?;
        if entry.header().entry_type() == EntryType::XGlobalHeader {
            continue;
        }
        let path_in_archive = entry
            .path()
            .map_err(|e| format!("invalid path in tar entry: {e}"))?
            .into_owned();

        if let Err(msg) = checked_join(target_dir, &path_in_archive) {
            error!("{} in {}", msg, archive_path_for_log.display());
            errors.push(msg);
            continue;
        }

        if entry.header().entry_type() == EntryType::Symlink {
            let target = entry
                .link_name()
                .map_err(|e| format!("invalid link target in tar entry: {e}"))?
                .map(|t| t.into_owned())
                .unwrap_or_default();
            if !link_stays_inside(&path_in_archive, &target) {
                let msg = format!(
                    "symlink {} -> {} points outside the archive",
                    path_in_archive.display(),
                    target.display()
                );
                error!("{} in {}", msg, archive_path_for_log.display());
                errors.push(msg);
                continue;
            }
        }

        // unpack_in resolves hard links relative to target_dir and refuses
        // anything that would escape it.
        match entry.unpack_in(target_dir) {
            Ok(true) => debug!("Unpacked {}", path_in_archive.display()),
            Ok(false) => {
                let msg = format!("refused to unpack {}", path_in_archive.display());
                warn!("{}", msg);
                errors.push(msg);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already exists, skipping", path_in_archive.display());
            }
            Err(e) => {
                let msg = format!("failed to unpack {}: {}", path_in_archive.display(), e);
                error!("{}", msg);
                errors.push(msg);
            }
        }
    }

    if !errors.is_empty() {
        return Err(format!(
            "{} error(s) during tar extraction: {}",
            errors.len(),
            errors.join("; ")
        ));
    }
    debug!(
        "Finished TAR extraction for {}",
        archive_path_for_log.display()
    );
    Ok(())
}

fn extract_zip_archive<R: Read + Seek>(
    reader: R,
    target_dir: &Path,
    archive_path_for_log: &Path,
) -> ExtractResult<()> {
    let mut archive = ZipArchive::new(reader).map_err(|e| format!("not a readable zip: {e}"))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| format!("error reading zip index {i}: {e}"))?;

        let path_in_archive = file
            .enclosed_name()
            .ok_or_else(|| format!("unsafe zip entry name {}", file.name()))?;
        let dest = checked_join(target_dir, &path_in_archive)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        if file.is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| format!("failed to create {}: {}", dest.display(), e))?;
            continue;
        }

        if file.is_symlink() {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .map_err(|e| format!("failed to read link {}: {}", file.name(), e))?;
            let link_target = PathBuf::from(String::from_utf8_lossy(&buf).to_string());
            if !link_stays_inside(&path_in_archive, &link_target) {
                return Err(format!(
                    "symlink {} points outside the archive",
                    path_in_archive.display()
                ));
            }
            #[cfg(unix)]
            {
                let _ = fs::remove_file(&dest);
                unix_fs::symlink(&link_target, &dest)
                    .map_err(|e| format!("failed to create symlink {}: {}", dest.display(), e))?;
            }
            #[cfg(not(unix))]
            warn!(
                "Cannot create symlink on non-unix system: {} -> {}",
                dest.display(),
                link_target.display()
            );
            continue;
        }

        let mut out_file = File::create(&dest)
            .map_err(|e| format!("failed to create {}: {}", dest.display(), e))?;
        io::copy(&mut file, &mut out_file)
            .map_err(|e| format!("failed to write {}: {}", dest.display(), e))?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest, fs::Permissions::from_mode(mode))
                .map_err(|e| format!("failed to set mode on {}: {}", dest.display(), e))?;
        }
    }
    debug!(
        "Finished ZIP extraction for {}",
        archive_path_for_log.display()
    );
    Ok(())
}
