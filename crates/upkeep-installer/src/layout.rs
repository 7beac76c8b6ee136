use std::path::{Path, PathBuf};

use upkeep_core::VersionId;

/// Where one package's update artifacts live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchLayout {
    scratch_dir: PathBuf,
    install_root: PathBuf,
    package_id: String,
}

impl ScratchLayout {
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        install_root: impl Into<PathBuf>,
        package_id: impl Into<String>,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            install_root: install_root.into(),
            package_id: package_id.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn archive_path(&self, version: &VersionId) -> PathBuf {
        self.scratch_dir
            .join(format!("{}-{}.zip", self.package_id, version))
    }

    pub fn staging_dir(&self, version: &VersionId) -> PathBuf {
        self.scratch_dir
            .join(format!("{}-{}", self.package_id, version))
    }

    pub fn unpacked_dir(&self, version: &VersionId) -> PathBuf {
        self.staging_dir(version).join(&self.package_id)
    }

    pub fn install_dir(&self) -> PathBuf {
        self.install_root.join(&self.package_id)
    }
}

pub(crate) fn part_path(archive_path: &Path) -> PathBuf {
    archive_path.with_file_name(format!(
        "{}.part",
        archive_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("archive")
    ))
}
