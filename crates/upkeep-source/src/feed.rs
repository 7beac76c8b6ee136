use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;
use upkeep_core::{Transport, UpdateError, VersionId};

/// Finds the `version` attribute of the `<addon id="...">` element for one
/// package inside an arbitrary metadata document.
#[derive(Debug, Clone)]
pub struct VersionPattern {
    package_id: String,
    element: Regex,
    id_attr: Regex,
    version_attr: Regex,
}

impl VersionPattern {
    pub fn new(package_id: &str) -> Result<Self> {
        Ok(Self {
            package_id: package_id.to_string(),
            element: Regex::new(r"<addon\b[^>]*>").context("invalid addon element pattern")?,
            id_attr: Regex::new(r#"\sid="([^"]*)""#).context("invalid id attribute pattern")?,
            version_attr: Regex::new(r#"\sversion="([A-Za-z0-9.+:~-]+)""#)
                .context("invalid version attribute pattern")?,
        })
    }

    pub fn find<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.element
            .find_iter(body)
            .map(|tag| tag.as_str())
            .filter(|tag| {
                self.id_attr
                    .captures(tag)
                    .is_some_and(|caps| &caps[1] == self.package_id)
            })
            .find_map(|tag| {
                self.version_attr
                    .captures(tag)
                    .and_then(|caps| caps.get(1))
                    .map(|value| value.as_str())
            })
    }
}

/// Reads the version a metadata document declares for `package_id`.
pub fn extract_package_version(package_id: &str, body: &str) -> Result<Option<VersionId>> {
    let pattern = VersionPattern::new(package_id)?;
    pattern.find(body).map(VersionId::parse).transpose()
}

/// The check half every downloadable strategy shares: fetch, match, compare.
#[derive(Debug, Clone)]
pub(crate) struct ReleaseFeed {
    pattern: VersionPattern,
    remote_version: Option<VersionId>,
    is_downgrade: bool,
}

impl ReleaseFeed {
    pub(crate) fn new(package_id: &str) -> Result<Self> {
        Ok(Self {
            pattern: VersionPattern::new(package_id)?,
            remote_version: None,
            is_downgrade: false,
        })
    }

    pub(crate) fn remote_version(&self) -> Option<&VersionId> {
        self.remote_version.as_ref()
    }

    pub(crate) fn is_downgrade(&self) -> bool {
        self.is_downgrade
    }

    pub(crate) fn check(
        &mut self,
        transport: &dyn Transport,
        info_url: &str,
        current: &VersionId,
        allow_downgrade: bool,
    ) -> Result<Option<VersionId>, UpdateError> {
        let body = transport
            .fetch_text(info_url)
            .map_err(|err| UpdateError::CheckFailed(format!("{:#}", anyhow::Error::new(err))))?;

        let token = self
            .pattern
            .find(&body)
            .ok_or_else(|| UpdateError::CheckFailed(format!("no version found at {info_url}")))?;
        let remote = VersionId::parse(token).map_err(|err| {
            UpdateError::CheckFailed(format!("invalid remote version '{token}': {err:#}"))
        })?;

        self.is_downgrade = remote < *current;
        self.remote_version = Some(remote.clone());
        debug!(remote = %remote, current = %current, "compared remote version");

        let offer = remote > *current || (allow_downgrade && remote != *current);
        Ok(offer.then_some(remote))
    }
}
