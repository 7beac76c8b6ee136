use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use upkeep_core::Branch;
use upkeep_source::{HttpOptions, SourceSettings};

use crate::layout::{default_install_root, StateLayout};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpkeepConfig {
    pub package_id: String,
    pub install_root: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub locale: String,
    pub host_major_version: u32,
    pub service_entry: String,
    /// Pins the installed version instead of reading the package manifest.
    pub installed_version: Option<String>,
    pub managed_install: bool,
    pub log_file: Option<PathBuf>,
    pub source: SourceConfig,
    pub monitor: MonitorConfig,
    pub host: HostCommands,
}

impl Default for UpkeepConfig {
    fn default() -> Self {
        Self {
            package_id: "script.plexmod".to_string(),
            install_root: None,
            scratch_dir: None,
            locale: "resource.language.en_gb".to_string(),
            host_major_version: 21,
            service_entry: "service.py".to_string(),
            installed_version: None,
            managed_install: false,
            log_file: None,
            source: SourceConfig::default(),
            monitor: MonitorConfig::default(),
            host: HostCommands::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub repo: String,
    pub stable_repo: String,
    pub branch: Option<String>,
    pub codename: Option<String>,
    pub user_agent: Option<String>,
    pub check_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repo: "pannal/plex-for-kodi".to_string(),
            stable_repo: "pannal/dontpanickodi".to_string(),
            branch: None,
            codename: None,
            user_agent: None,
            check_timeout_secs: 10,
            download_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub decision_timeout_polls: u32,
    pub quiescence_timeout_polls: u32,
    pub major_change_timeout_polls: u32,
    pub focused_tick_secs: u64,
    pub unfocused_tick_secs: u64,
    pub focused_windows: Vec<String>,
    pub launch_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            decision_timeout_polls: 3_600,
            quiescence_timeout_polls: 1_800,
            major_change_timeout_polls: 3_000,
            focused_tick_secs: 2,
            unfocused_tick_secs: 10,
            focused_windows: vec!["HomeWindow".to_string(), "SettingsWindow".to_string()],
            launch_delay_ms: 1_000,
        }
    }
}

/// Shell command lines standing in for the host's relaunch primitives. An
/// empty command is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCommands {
    pub refresh_local_packages: String,
    pub refresh_repositories: String,
    pub activate_home: String,
    /// `{delay}` is replaced with the launch delay in seconds.
    pub launch_entry_point: String,
    /// Exit status 0 means the host is playing media.
    pub playing_check: String,
}

impl UpkeepConfig {
    /// Reads `config.toml`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("failed to parse config: {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid config.toml")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    pub fn branch(&self) -> Branch {
        let derived = Branch::for_host_major(self.host_major_version);
        Branch::new(
            self.source.branch.clone().unwrap_or(derived.name),
            self.source.codename.clone().unwrap_or(derived.codename),
        )
    }

    pub fn source_settings(&self) -> SourceSettings {
        let mut settings = SourceSettings::new(&self.package_id, self.branch());
        settings.repo = self.source.repo.clone();
        settings.stable_repo = self.source.stable_repo.clone();
        settings
    }

    pub fn http_options(&self) -> HttpOptions {
        let mut options = HttpOptions::default();
        if let Some(user_agent) = &self.source.user_agent {
            options.user_agent = user_agent.clone();
        }
        options.check_timeout = Duration::from_secs(self.source.check_timeout_secs);
        options.download_timeout = Duration::from_secs(self.source.download_timeout_secs);
        options
    }

    pub fn install_root(&self) -> Result<PathBuf> {
        match &self.install_root {
            Some(root) => Ok(root.clone()),
            None => default_install_root(),
        }
    }

    pub fn scratch_dir(&self, layout: &StateLayout) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| layout.scratch_dir())
    }
}
