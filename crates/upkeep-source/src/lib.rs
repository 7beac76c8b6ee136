mod beta;
mod feed;
mod registry;
mod repository;
mod stable;
mod transport;

use std::sync::Arc;

use upkeep_core::{Branch, HostControl, Transport, UpdateError, UpdateMode, VersionId};

pub use beta::BetaSource;
pub use feed::{extract_package_version, VersionPattern};
pub use registry::{create_source, registered_modes, resolve_source};
pub use repository::RepositorySource;
pub use stable::StableSource;
pub use transport::{HttpOptions, HttpTransport};

/// One distribution channel: knows where release metadata and archives live
/// and whether the remote release should replace the installed one.
pub trait UpdateSource: Send {
    fn mode(&self) -> UpdateMode;

    fn branch(&self) -> &Branch;

    fn info_url(&self) -> String;

    /// `None` when the strategy never downloads or needs a checked remote
    /// version to build the URL.
    fn download_url(&self) -> Option<String>;

    fn remote_version(&self) -> Option<&VersionId>;

    /// Whether the last observed remote version is older than the version
    /// it was checked against.
    fn is_downgrade(&self) -> bool;

    /// Returns the remote version when it is strictly newer than `current`,
    /// or, with `allow_downgrade`, whenever it differs.
    fn check(
        &mut self,
        current: &VersionId,
        allow_downgrade: bool,
    ) -> Result<Option<VersionId>, UpdateError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub package_id: String,
    pub repo: String,
    pub stable_repo: String,
    pub branch: Branch,
}

impl SourceSettings {
    pub fn new(package_id: impl Into<String>, branch: Branch) -> Self {
        Self {
            package_id: package_id.into(),
            repo: "pannal/plex-for-kodi".to_string(),
            stable_repo: "pannal/dontpanickodi".to_string(),
            branch,
        }
    }
}

/// Shared collaborators handed to every strategy constructor.
#[derive(Clone)]
pub struct SourceContext {
    pub settings: SourceSettings,
    pub transport: Arc<dyn Transport>,
    pub host: Arc<dyn HostControl>,
}
