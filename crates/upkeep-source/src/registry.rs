use anyhow::{anyhow, Result};
use upkeep_core::UpdateMode;

use crate::beta::BetaSource;
use crate::repository::RepositorySource;
use crate::stable::StableSource;
use crate::{SourceContext, UpdateSource};

type Constructor = fn(&SourceContext) -> Result<Box<dyn UpdateSource>>;

const REGISTRY: [(UpdateMode, Constructor); 3] = [
    (UpdateMode::Stable, StableSource::boxed),
    (UpdateMode::Beta, BetaSource::boxed),
    (UpdateMode::Repository, RepositorySource::boxed),
];

pub fn registered_modes() -> impl Iterator<Item = UpdateMode> {
    REGISTRY.iter().map(|(mode, _)| *mode)
}

pub fn create_source(mode: UpdateMode, context: &SourceContext) -> Result<Box<dyn UpdateSource>> {
    let (_, constructor) = REGISTRY
        .iter()
        .find(|(registered, _)| *registered == mode)
        .ok_or_else(|| anyhow!("no update source registered for mode '{mode}'"))?;
    constructor(context)
}

/// Resolves a mode name (as stored in settings or sent over the channel).
pub fn resolve_source(mode: &str, context: &SourceContext) -> Result<Box<dyn UpdateSource>> {
    let parsed = UpdateMode::parse(mode).ok_or_else(|| {
        let known = registered_modes()
            .map(UpdateMode::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        anyhow!("unknown update source '{mode}'; expected one of: {known}")
    })?;
    create_source(parsed, context)
}
