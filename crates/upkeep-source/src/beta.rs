use std::sync::Arc;

use anyhow::Result;
use upkeep_core::{Branch, Transport, UpdateError, UpdateMode, VersionId};

use crate::feed::ReleaseFeed;
use crate::{SourceContext, SourceSettings, UpdateSource};

/// Tracks the head of a development branch: metadata from the branch's raw
/// `addon.xml`, payload from the branch archive.
pub struct BetaSource {
    settings: SourceSettings,
    transport: Arc<dyn Transport>,
    feed: ReleaseFeed,
}

impl BetaSource {
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

impl UpdateSource for BetaSource {
    fn mode(&self) -> UpdateMode {
        UpdateMode::Beta
    }

    fn branch(&self) -> &Branch {
        &self.settings.branch
    }

    fn info_url(&self) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/addon.xml",
            self.settings.repo, self.settings.branch.name
        )
    }

    fn download_url(&self) -> Option<String> {
        Some(format!(
            "https://github.com/{}/archive/refs/heads/{}.zip",
            self.settings.repo, self.settings.branch.name
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
