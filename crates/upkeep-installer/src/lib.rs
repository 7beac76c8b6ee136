mod download;
mod fs_utils;
mod layout;
mod major;
mod pipeline;
mod unpack;

pub use download::{download_archive, DownloadStatus};
pub use fs_utils::{remove_dir_if_exists, remove_file_if_exists};
pub use layout::ScratchLayout;
pub use major::{detect_major_change, file_digest, high_risk_files};
pub use pipeline::{cleanup, install_package, ArchiveJob, ArchivePipeline, InstallReport};
pub use unpack::unpack_archive;
