use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use upkeep_core::{Branch, HostControl, UpdateError, UpdateMode, VersionId};

use crate::{SourceContext, UpdateSource};

/// Leaves updates to the host's own package repository. A check only asks
/// the host to refresh; this coordinator never offers anything itself.
pub struct RepositorySource {
    branch: Branch,
    host: Arc<dyn HostControl>,
}

impl RepositorySource {
    pub fn new(context: &SourceContext) -> Self {
        Self {
            branch: context.settings.branch.clone(),
            host: Arc::clone(&context.host),
        }
    }

    pub(crate) fn boxed(context: &SourceContext) -> Result<Box<dyn UpdateSource>> {
        Ok(Box::new(Self::new(context)))
    }
}

impl UpdateSource for RepositorySource {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Repository
    }

    fn branch(&self) -> &Branch {
        &self.branch
    }

    fn info_url(&self) -> String {
        String::new()
    }

    fn download_url(&self) -> Option<String> {
        None
    }

    fn remote_version(&self) -> Option<&VersionId> {
        None
    }

    fn is_downgrade(&self) -> bool {
        false
    }

    fn check(
        &mut self,
        _current: &VersionId,
        _allow_downgrade: bool,
    ) -> Result<Option<VersionId>, UpdateError> {
        info!("delegating update check to host repository");
        if let Err(err) = self.host.refresh_repositories() {
            warn!(error = %format!("{err:#}"), "host repository refresh failed");
        }
        if let Err(err) = self.host.refresh_local_packages() {
            warn!(error = %format!("{err:#}"), "host package refresh failed");
        }
        Ok(None)
    }
}
