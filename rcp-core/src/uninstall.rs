// rcp-core/src/uninstall.rs
use std::fs;
use std::io;
use std::path::PathBuf;

use rcp_common::error::Result;
use rcp_common::keg::{InstalledKeg, KegRegistry};
use tracing::{debug, warn};

use crate::install::link::{find_keg_links, unlink_keg_links};
use crate::install::map_io;

#[derive(Debug, Clone, Default)]
pub struct UninstallReport {
    pub keg: PathBuf,
    pub links_removed: Vec<PathBuf>,
}

/// Removes an installed keg: first the `bin` links recorded in its receipt
/// (only those still pointing into the keg), then the keg, then the
/// per-name Cellar directory if nothing else is left in it.
pub fn uninstall_keg(keg: &InstalledKeg, kegs: &KegRegistry) -> Result<UninstallReport> {
    debug!("Uninstalling {} version {}", keg.name, keg.version);

    let recorded_links = match kegs.read_receipt(keg) {
        Ok(receipt) => receipt.links,
        Err(e) => {
            warn!(
                "No usable receipt for {} {} ({}); scanning {} for links.",
                keg.name,
                keg.version,
                e,
                kegs.config().bin_dir().display()
            );
            find_keg_links(kegs.config(), &keg.path)
        }
    };
    let links_removed = unlink_keg_links(&recorded_links, &keg.path)?;

    match fs::remove_dir_all(&keg.path) {
        Ok(()) => debug!("Removed keg directory {}", keg.path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => warn!(
            "Keg directory {} not found during uninstall. It might have been already removed.",
            keg.path.display()
        ),
        Err(e) => return Err(map_io(e, &keg.path)),
    }

    let name_dir = kegs.config().recipe_cellar_dir(&keg.name);
    if fs::read_dir(&name_dir).is_ok_and(|mut entries| entries.next().is_none()) {
        if let Err(e) = fs::remove_dir(&name_dir) {
            debug!("Could not remove {}: {}", name_dir.display(), e);
        }
    }

    Ok(UninstallReport {
        keg: keg.path.clone(),
        links_removed,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs as unix_fs;

    use rcp_common::model::Version;
    use rcp_common::Config;

    use super::*;
    use crate::install::link::link_bin_entries;

    #[test]
    fn removes_links_keg_and_empty_name_dir() {
        let dir = tempfile::tempdir().unwrap();
        let kegs = KegRegistry::new(Config::with_prefix(dir.path()).unwrap());
        let keg_path = kegs.get_keg_path("tool", &Version::new("1.0"));
        fs::create_dir_all(keg_path.join("bin")).unwrap();
        fs::write(keg_path.join("bin/tool"), "#!/bin/sh\n").unwrap();
        link_bin_entries(&[keg_path.join("bin/tool")], kegs.config()).unwrap();

        let keg = kegs.get_installed_keg("tool").unwrap().unwrap();
        let report = uninstall_keg(&keg, &kegs).unwrap();

        assert_eq!(report.links_removed, vec![dir.path().join("bin/tool")]);
        assert!(!keg_path.exists());
        assert!(!kegs.config().recipe_cellar_dir("tool").exists());
        assert!(kegs.get_installed_keg("tool").unwrap().is_none());
    }

    #[test]
    fn keeps_other_versions_and_foreign_links() {
        let dir = tempfile::tempdir().unwrap();
        let kegs = KegRegistry::new(Config::with_prefix(dir.path()).unwrap());
        for v in ["1.0", "2.0"] {
            fs::create_dir_all(kegs.get_keg_path("tool", &Version::new(v))).unwrap();
        }
        fs::create_dir_all(kegs.config().bin_dir()).unwrap();
        let other = kegs.get_keg_path("tool", &Version::new("1.0")).join("tool");
        unix_fs::symlink(&other, kegs.config().bin_dir().join("tool")).unwrap();

        let newest = kegs.get_installed_keg("tool").unwrap().unwrap();
        assert_eq!(newest.version, Version::new("2.0"));
        let report = uninstall_keg(&newest, &kegs).unwrap();

        assert!(report.links_removed.is_empty());
        assert!(kegs.config().bin_dir().join("tool").symlink_metadata().is_ok());
        let remaining = kegs.get_installed_keg("tool").unwrap().unwrap();
        assert_eq!(remaining.version, Version::new("1.0"));
    }
}
