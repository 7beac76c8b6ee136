use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Everything the coordinator keeps on disk lives under one state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(root) => Ok(Self::new(root)),
            None => Ok(Self::new(default_state_root()?)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.toml")
    }

    pub fn channel_dir(&self) -> PathBuf {
        self.root.join("channel")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.root.clone(), self.channel_dir(), self.scratch_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create state dir: {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_state_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows state root")?;
        return Ok(PathBuf::from(app_data).join("Upkeep"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home).join(".upkeep"))
}

/// The host's add-on directory, used when `install_root` is not configured.
pub fn default_install_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("APPDATA")
            .context("APPDATA is not set; cannot resolve Windows add-on directory")?;
        return Ok(PathBuf::from(app_data).join("Kodi").join("addons"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve add-on directory")?;
    Ok(PathBuf::from(home).join(".kodi").join("addons"))
}
