//! The background loop: decides when to check, negotiates with the
//! foreground process over the channel, and drives the archive pipeline.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};
use upkeep_channel::{
    keys, BackgroundEndpoint, ChannelError, ChannelStore, Decision, Message, Offer, PollPolicy,
};
use upkeep_core::{HostControl, MajorChange, UpdateError, UpdateMode, VersionId};
use upkeep_installer::ArchivePipeline;
use upkeep_source::{create_source, extract_package_version, SourceContext, UpdateSource};

use crate::config::MonitorConfig;
use crate::settings::{Settings, LAST_UPDATE_CHECK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Sleep,
    Wake,
}

/// How a negotiation session ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    NoUpdate,
    Declined,
    Installed {
        launched: bool,
        major_change: MajorChange,
    },
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTiming {
    pub poll_interval: Duration,
    pub startup_poll: Duration,
    pub decision_timeout_polls: u32,
    pub quiescence_timeout_polls: u32,
    pub major_change_timeout_polls: u32,
    pub focused_tick: Duration,
    pub unfocused_tick: Duration,
    pub focused_windows: Vec<String>,
    pub launch_delay: Duration,
}

impl MonitorTiming {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            startup_poll: Duration::from_secs(1),
            decision_timeout_polls: config.decision_timeout_polls,
            quiescence_timeout_polls: config.quiescence_timeout_polls,
            major_change_timeout_polls: config.major_change_timeout_polls,
            focused_tick: Duration::from_secs(config.focused_tick_secs),
            unfocused_tick: Duration::from_secs(config.unfocused_tick_secs),
            focused_windows: config.focused_windows.clone(),
            launch_delay: Duration::from_millis(config.launch_delay_ms),
        }
    }

    fn policy(&self, timeout_polls: u32) -> PollPolicy {
        PollPolicy::new(self.poll_interval, timeout_polls)
    }
}

impl Default for MonitorTiming {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// Where the currently installed version comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledVersion {
    Pinned(VersionId),
    Manifest { path: PathBuf, package_id: String },
}

impl InstalledVersion {
    pub fn resolve(&self) -> anyhow::Result<VersionId> {
        match self {
            Self::Pinned(version) => Ok(version.clone()),
            Self::Manifest { path, package_id } => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                extract_package_version(package_id, &raw)?.ok_or_else(|| {
                    anyhow!("no version for '{package_id}' in {}", path.display())
                })
            }
        }
    }
}

pub struct MonitorParts<S> {
    pub endpoint: BackgroundEndpoint<S>,
    pub settings: Settings,
    pub context: SourceContext,
    pub pipeline: ArchivePipeline,
    pub installed: InstalledVersion,
    pub timing: MonitorTiming,
}

pub struct Monitor<S> {
    endpoint: BackgroundEndpoint<S>,
    settings: Settings,
    context: SourceContext,
    pipeline: ArchivePipeline,
    installed: InstalledVersion,
    timing: MonitorTiming,
    source: Box<dyn UpdateSource>,
    mode: UpdateMode,
    events: Option<Receiver<HostEvent>>,
    sleeping: bool,
    check_immediate: bool,
    allow_downgrade: bool,
    last_check: NaiveDateTime,
    check_interval_hours: i64,
}

impl<S: ChannelStore> Monitor<S> {
    pub fn new(parts: MonitorParts<S>) -> anyhow::Result<Self> {
        let MonitorParts {
            endpoint,
            settings,
            context,
            pipeline,
            installed,
            timing,
        } = parts;

        let configured = settings.update_source();
        let mode = UpdateMode::parse(&configured).unwrap_or_else(|| {
            warn!(mode = %configured, "unknown update source, falling back to repository");
            UpdateMode::Repository
        });
        let source = create_source(mode, &context)?;

        Ok(Self {
            last_check: settings.last_update_check(),
            check_interval_hours: settings.update_interval_hours(),
            check_immediate: settings.update_check_startup(),
            endpoint,
            settings,
            context,
            pipeline,
            installed,
            timing,
            source,
            mode,
            events: None,
            sleeping: false,
            allow_downgrade: false,
        })
    }

    pub fn with_events(mut self, events: Receiver<HostEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[cfg(test)]
    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    #[cfg(test)]
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    #[cfg(test)]
    pub fn check_pending(&self) -> bool {
        self.check_immediate
    }

    #[cfg(test)]
    pub fn allows_downgrade(&self) -> bool {
        self.allow_downgrade
    }

    fn host(&self) -> &Arc<dyn HostControl> {
        &self.context.host
    }

    /// Runs until the abort signal fires or auto-update is switched off.
    pub fn run(&mut self) {
        if !self.wait_for_host_start() {
            return;
        }
        info!(mode = %self.mode, "checking for updates periodically");

        let abort = self.endpoint.channel().abort_signal().clone();
        while !abort.is_aborted() {
            self.tick();
            if abort.wait(self.tick_interval()) {
                break;
            }
            if !self.settings.auto_update_check() {
                info!("automatic update checks disabled, stopping monitor");
                break;
            }
        }
    }

    /// Blocks until the foreground process reports it is running. Returns
    /// false if the host shut down first.
    pub fn wait_for_host_start(&self) -> bool {
        let channel = self.endpoint.channel();
        loop {
            match channel.read_flag(keys::RUNNING) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => warn!(error = %format!("{:#}", anyhow::Error::new(err)), "failed to read host state"),
            }
            if channel.abort_signal().wait(self.timing.startup_poll) {
                return false;
            }
        }
    }

    /// One loop iteration. Returns the session outcome when a check ran.
    pub fn tick(&mut self) -> Option<SessionOutcome> {
        self.drain_events();
        self.apply_source_change();

        if self.sleeping || !self.check_due() {
            return None;
        }
        if !self.host_ready() {
            return None;
        }

        match self.run_session() {
            Ok(outcome) => {
                if let SessionOutcome::Installed {
                    launched,
                    major_change,
                } = outcome
                {
                    info!(launched, major_change = major_change.as_str(), "update session installed");
                } else {
                    debug!(?outcome, "update session finished");
                }
                Some(outcome)
            }
            Err(err) => {
                warn!(error = %format!("{:#}", anyhow::Error::new(err)), "update session failed");
                None
            }
        }
    }

    pub fn tick_interval(&self) -> Duration {
        let window = self
            .endpoint
            .channel()
            .read(keys::ACTIVE_WINDOW)
            .unwrap_or_default();
        if self.timing.focused_windows.iter().any(|name| *name == window) {
            self.timing.focused_tick
        } else {
            self.timing.unfocused_tick
        }
    }

    fn drain_events(&mut self) {
        let Some(events) = &self.events else {
            return;
        };
        loop {
            match events.try_recv() {
                Ok(HostEvent::Sleep) => {
                    debug!("host going to sleep");
                    self.sleeping = true;
                }
                Ok(HostEvent::Wake) => {
                    debug!("host woke up");
                    self.sleeping = false;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    break;
                }
            }
        }
    }

    fn apply_source_change(&mut self) {
        let requested = match self.endpoint.take_source_change() {
            Ok(Some(requested)) => requested,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "failed to read source change request");
                return;
            }
        };
        let Some(mode) = UpdateMode::parse(&requested) else {
            warn!(mode = %requested, "ignoring unknown update source");
            return;
        };
        if mode == self.mode {
            return;
        }
        match create_source(mode, &self.context) {
            Ok(source) => {
                info!(from = %self.mode, to = %mode, "update source changed");
                self.source = source;
                self.mode = mode;
                self.allow_downgrade = true;
                self.check_immediate = true;
            }
            Err(err) => warn!(mode = %mode, error = %format!("{err:#}"), "failed to switch update source"),
        }
    }

    fn check_due(&self) -> bool {
        if self.check_immediate {
            return true;
        }
        let now = Local::now().naive_local();
        TimeDelta::try_hours(self.check_interval_hours)
            .and_then(|interval| self.last_check.checked_add_signed(interval))
            .is_some_and(|due| due <= now)
    }

    /// Re-evaluated every tick; these change underneath us.
    fn host_ready(&self) -> bool {
        if self.host().is_playing() {
            debug!("host is playing, skipping update check");
            return false;
        }
        match self.endpoint.host_status() {
            Ok(status) => status.ready_for_check(),
            Err(err) => {
                warn!(error = %err, "failed to read host state");
                false
            }
        }
    }

    /// One negotiation session. Every session entry on the channel is reset
    /// afterwards, whatever the outcome.
    pub fn run_session(&mut self) -> Result<SessionOutcome, UpdateError> {
        self.check_immediate = false;
        let result = self.negotiate();
        self.endpoint.clear_session();
        match result {
            Err(UpdateError::Aborted) => Ok(SessionOutcome::Aborted),
            other => other,
        }
    }

    fn negotiate(&mut self) -> Result<SessionOutcome, UpdateError> {
        let current = match self.installed.resolve() {
            Ok(current) => current,
            Err(err) => {
                self.stamp_last_check();
                return Err(UpdateError::CheckFailed(format!(
                    "installed version unavailable: {err:#}"
                )));
            }
        };
        let allow_downgrade = std::mem::take(&mut self.allow_downgrade);
        info!(mode = %self.mode, current = %current, allow_downgrade, "checking for updates");

        let checked = self.source.check(&current, allow_downgrade);
        self.stamp_last_check();
        let Some(version) = checked? else {
            debug!(mode = %self.mode, "no update available");
            return Ok(SessionOutcome::NoUpdate);
        };

        let download_url = self.source.download_url().ok_or_else(|| {
            UpdateError::CheckFailed(format!("no download location for {version}"))
        })?;
        let is_downgrade = self.source.is_downgrade();
        info!(version = %version, is_downgrade, "update available, asking user");

        self.endpoint
            .send(&Message::Offer(Offer {
                version: version.to_string(),
                is_downgrade,
            }))
            .map_err(|err| channel_failure(err, UpdateError::NoUserResponse))?;

        let decision = self
            .endpoint
            .await_decision(self.timing.policy(self.timing.decision_timeout_polls))
            .map_err(|err| channel_failure(err, UpdateError::NoUserResponse))?;
        info!(decision = decision.as_token(), "user responded");
        if decision == Decision::Decline {
            info!(version = %version, "update skipped");
            return Ok(SessionOutcome::Declined);
        }

        self.endpoint
            .await_quiescence(self.timing.policy(self.timing.quiescence_timeout_polls))
            .map_err(|err| channel_failure(err, UpdateError::HostStillRunning))?;

        let mut job = self.pipeline.job(version, download_url);
        let report = self.pipeline.run(&mut job)?;

        let launched = self.launch(report.major_change);
        Ok(SessionOutcome::Installed {
            launched,
            major_change: report.major_change,
        })
    }

    fn stamp_last_check(&mut self) {
        self.last_check = Local::now().naive_local();
        if let Err(err) = self.settings.set_timestamp(LAST_UPDATE_CHECK, self.last_check) {
            warn!(error = %format!("{err:#}"), "failed to persist last update check");
        }
    }

    /// Post-install: confirm major changes, refresh the host and relaunch.
    /// Nothing here can fail the session; the package is already installed.
    fn launch(&self, major_change: MajorChange) -> bool {
        let host = self.host();
        let aborted = self.endpoint.channel().abort_signal().wait(self.timing.launch_delay);

        let mut do_start = !aborted;
        if do_start && major_change.is_major() {
            do_start = self.confirm_major_change(major_change);
        }

        if let Err(err) = host.refresh_local_packages() {
            warn!(error = %format!("{err:#}"), "failed to refresh local packages");
        }
        if let Err(err) = host.activate_home() {
            warn!(error = %format!("{err:#}"), "failed to activate home screen");
        }
        host.finish_progress();

        if !do_start {
            info!("update installed, not relaunching");
            return false;
        }
        match host.launch_entry_point(0) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to relaunch package");
                false
            }
        }
    }

    fn confirm_major_change(&self, major_change: MajorChange) -> bool {
        if let Err(err) = self.endpoint.send(&Message::MajorChange(major_change)) {
            warn!(error = %err, "failed to publish major change");
            return false;
        }
        match self
            .endpoint
            .await_major_change_ack(self.timing.policy(self.timing.major_change_timeout_polls))
        {
            Ok(launch) => {
                info!(kind = major_change.as_str(), launch, "major change acknowledged");
                launch
            }
            Err(err) => {
                warn!(error = %err, "no answer to major change prompt, not relaunching");
                false
            }
        }
    }
}

fn channel_failure(err: ChannelError, on_timeout: UpdateError) -> UpdateError {
    match err {
        ChannelError::Timeout { .. } => on_timeout,
        ChannelError::Aborted { .. } => UpdateError::Aborted,
        other => UpdateError::Unexpected(anyhow::Error::new(other)),
    }
}
