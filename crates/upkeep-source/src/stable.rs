use std::sync::Arc;

use anyhow::Result;
use upkeep_core::{Branch, Transport, UpdateError, UpdateMode, VersionId};

use crate::feed::ReleaseFeed;
use crate::{SourceContext, SourceSettings, UpdateSource};

/// Tracks published release zips, laid out per host codename.
pub struct StableSource {
    settings: SourceSettings,
    transport: Arc<dyn Transport>,
    feed: ReleaseFeed,
}

impl StableSource {
    pub fn new(context: &SourceContext) -> Result<Self> {
        Ok(Self {
            settings: context.settings.clone(),
            transport: Arc::clone(&context.transport),
            feed: ReleaseFeed::new(&context.settings.package_id)?,
        })
    }

    pub(crate) fn boxed(context: &SourceContext) -> Result<Box<dyn UpdateSource>> {
        Ok(Box::new(Self::new(context)?))
    }
}

impl UpdateSource for StableSource {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Stable
    }

    fn branch(&self) -> &Branch {
        &self.settings.branch
    }

    fn info_url(&self) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/master/{}/zips/{}/addon.xml",
            self.settings.stable_repo, self.settings.branch.codename, self.settings.package_id
        )
    }

    fn download_url(&self) -> Option<String> {
        let version = self.feed.remote_version()?;
        Some(format!(
            "https://github.com/{repo}/raw/master/{codename}/zips/{id}/{id}-{version}.zip",
            repo = self.settings.stable_repo,
            codename = self.settings.branch.codename,
            id = self.settings.package_id,
        ))
    }

    fn remote_version(&self) -> Option<&VersionId> {
        self.feed.remote_version()
    }

    fn is_downgrade(&self) -> bool {
        self.feed.is_downgrade()
    }

    fn check(
        &mut self,
        current: &VersionId,
        allow_downgrade: bool,
    ) -> Result<Option<VersionId>, UpdateError> {
        let info_url = self.info_url();
        self.feed
            .check(self.transport.as_ref(), &info_url, current, allow_downgrade)
    }
}
