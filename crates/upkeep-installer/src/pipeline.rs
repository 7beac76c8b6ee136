use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use upkeep_core::{HostControl, MajorChange, PipelineStage, Transport, UpdateError, VersionId};

use crate::download::{download_archive, DownloadStatus};
use crate::fs_utils::{move_dir_or_copy, remove_dir_if_exists, remove_file_if_exists};
use crate::layout::{part_path, ScratchLayout};
use crate::major::detect_major_change;
use crate::unpack::unpack_archive;

/// One in-flight update attempt and the scratch paths it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    pub target_version: VersionId,
    pub download_url: String,
    pub archive_path: PathBuf,
    pub staging_dir: PathBuf,
    pub unpacked_dir: PathBuf,
    pub major_change: MajorChange,
}

impl ArchiveJob {
    pub fn new(layout: &ScratchLayout, target_version: VersionId, download_url: String) -> Self {
        Self {
            archive_path: layout.archive_path(&target_version),
            staging_dir: layout.staging_dir(&target_version),
            unpacked_dir: layout.unpacked_dir(&target_version),
            target_version,
            download_url,
            major_change: MajorChange::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version: VersionId,
    pub install_dir: PathBuf,
    pub download: DownloadStatus,
    pub major_change: MajorChange,
}

pub struct ArchivePipeline {
    layout: ScratchLayout,
    locale: String,
    service_entry: String,
    transport: Arc<dyn Transport>,
    host: Arc<dyn HostControl>,
}

impl ArchivePipeline {
    pub fn new(
        layout: ScratchLayout,
        locale: impl Into<String>,
        service_entry: impl Into<String>,
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostControl>,
    ) -> Self {
        Self {
            layout,
            locale: locale.into(),
            service_entry: service_entry.into(),
            transport,
            host,
        }
    }

    pub fn layout(&self) -> &ScratchLayout {
        &self.layout
    }

    pub fn job(&self, target_version: VersionId, download_url: String) -> ArchiveJob {
        ArchiveJob::new(&self.layout, target_version, download_url)
    }

    /// Download, unpack, detect, install, clean up. The live install is only
    /// touched once unpack and detection have succeeded; scratch files are
    /// removed whether or not the run succeeds.
    pub fn run(&self, job: &mut ArchiveJob) -> Result<InstallReport, UpdateError> {
        let outcome = self.install_steps(job);
        if outcome.is_ok() {
            self.host.report_progress(PipelineStage::CleaningUp);
        }
        cleanup(job);
        match outcome {
            Ok(report) => {
                self.host.report_progress(PipelineStage::PreparingToStart);
                Ok(report)
            }
            Err(err) => {
                self.host.finish_progress();
                Err(err)
            }
        }
    }

    fn install_steps(&self, job: &mut ArchiveJob) -> Result<InstallReport, UpdateError> {
        self.host.report_progress(PipelineStage::Downloading);
        let download = download_archive(
            self.transport.as_ref(),
            &job.download_url,
            &job.archive_path,
        )?;

        self.host.report_progress(PipelineStage::Unpacking);
        let unpacked = unpack_archive(&job.archive_path, &job.staging_dir, self.layout.package_id())
            .map_err(|source| UpdateError::UnpackFailed { source })?;
        job.unpacked_dir = unpacked;

        let install_dir = self.layout.install_dir();
        job.major_change = detect_major_change(
            &install_dir,
            &job.unpacked_dir,
            &self.locale,
            &self.service_entry,
        )?;

        self.host.report_progress(PipelineStage::Installing);
        install_package(&job.unpacked_dir, &install_dir)
            .map_err(|source| UpdateError::InstallFailed { source })?;
        info!(
            version = %job.target_version,
            path = %install_dir.display(),
            major_change = job.major_change.as_str(),
            "installed update"
        );

        Ok(InstallReport {
            version: job.target_version.clone(),
            install_dir,
            download,
            major_change: job.major_change,
        })
    }
}

/// Replaces `install_dir` with `unpacked_dir`: remove, then move. Never merges.
pub fn install_package(unpacked_dir: &Path, install_dir: &Path) -> anyhow::Result<()> {
    if install_dir.exists() {
        fs::remove_dir_all(install_dir).with_context(|| {
            format!(
                "failed to remove existing package dir: {}",
                install_dir.display()
            )
        })?;
    }
    move_dir_or_copy(unpacked_dir, install_dir)
}

/// Removes the archive, any partial download, and the staging directory.
/// Failures are logged and never returned.
pub fn cleanup(job: &ArchiveJob) {
    for file in [job.archive_path.clone(), part_path(&job.archive_path)] {
        if let Err(err) = remove_file_if_exists(&file) {
            warn!(path = %file.display(), error = %err, "failed to remove update archive");
        }
    }
    if let Err(err) = remove_dir_if_exists(&job.staging_dir) {
        warn!(path = %job.staging_dir.display(), error = %err, "failed to remove staging dir");
    }
}
