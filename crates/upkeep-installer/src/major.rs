use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;
use upkeep_core::MajorChange;

/// Files whose live replacement requires a full host restart, in the order
/// they are compared.
pub fn high_risk_files(locale: &str, service_entry: &str) -> [(MajorChange, PathBuf); 2] {
    [
        (
            MajorChange::Localization,
            Path::new("resources")
                .join("language")
                .join(locale)
                .join("strings.po"),
        ),
        (MajorChange::ServiceLogic, PathBuf::from(service_entry)),
    ]
}

/// Compares the high-risk files of the installed and the freshly unpacked
/// package. A file present on only one side counts as changed.
pub fn detect_major_change(
    installed_dir: &Path,
    unpacked_dir: &Path,
    locale: &str,
    service_entry: &str,
) -> Result<MajorChange> {
    for (kind, rel) in high_risk_files(locale, service_entry) {
        let before = file_digest(&installed_dir.join(&rel))?;
        let after = file_digest(&unpacked_dir.join(&rel))?;
        if before != after {
            debug!(file = %rel.display(), kind = kind.as_str(), "high-risk file changed");
            return Ok(kind);
        }
    }
    Ok(MajorChange::None)
}

/// Hex SHA-256 of `path`, or `None` if it does not exist.
pub fn file_digest(path: &Path) -> Result<Option<String>> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to open {}", path.display()));
        }
    };
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    Ok(Some(hex::encode(hasher.finalize())))
}
