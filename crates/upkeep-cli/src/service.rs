use std::process::Stdio;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use upkeep_channel::{keys, AbortSignal, BackgroundEndpoint, Channel, ChannelStore, FileStore};
use upkeep_core::{HostControl, VersionId};
use upkeep_installer::{ArchivePipeline, ScratchLayout};
use upkeep_source::{HttpTransport, SourceContext};

use crate::config::UpkeepConfig;
use crate::host::CommandHost;
use crate::layout::StateLayout;
use crate::monitor::{HostEvent, InstalledVersion, Monitor, MonitorParts, MonitorTiming};
use crate::settings::{FileSettings, Settings};

const SLEEP_WATCH_INTERVAL: Duration = Duration::from_secs(1);

pub fn open_settings(layout: &StateLayout) -> Result<Settings> {
    Ok(Settings::new(Arc::new(FileSettings::open(
        layout.settings_path(),
    )?)))
}

pub fn open_channel(layout: &StateLayout, abort: AbortSignal) -> Result<Channel<Arc<FileStore>>> {
    let store = FileStore::open(layout.channel_dir())?;
    Ok(Channel::new(Arc::new(store), abort))
}

pub fn installed_version(config: &UpkeepConfig) -> Result<InstalledVersion> {
    if let Some(pinned) = &config.installed_version {
        let version = VersionId::parse(pinned)
            .with_context(|| format!("invalid installed_version '{pinned}' in config"))?;
        return Ok(InstalledVersion::Pinned(version));
    }
    Ok(InstalledVersion::Manifest {
        path: config
            .install_root()?
            .join(&config.package_id)
            .join("addon.xml"),
        package_id: config.package_id.clone(),
    })
}

pub fn source_context(config: &UpkeepConfig, host: Arc<dyn HostControl>) -> Result<SourceContext> {
    let transport = HttpTransport::new(&config.http_options())?;
    Ok(SourceContext {
        settings: config.source_settings(),
        transport: Arc::new(transport),
        host,
    })
}

pub fn build_monitor<S: ChannelStore>(
    layout: &StateLayout,
    config: &UpkeepConfig,
    channel: Channel<S>,
    settings: Settings,
    context: SourceContext,
) -> Result<Monitor<S>> {
    let scratch = ScratchLayout::new(
        config.scratch_dir(layout),
        config.install_root()?,
        &config.package_id,
    );
    let pipeline = ArchivePipeline::new(
        scratch,
        &config.locale,
        &config.service_entry,
        Arc::clone(&context.transport),
        Arc::clone(&context.host),
    );
    Monitor::new(MonitorParts {
        endpoint: BackgroundEndpoint::new(channel),
        settings,
        context,
        pipeline,
        installed: installed_version(config)?,
        timing: MonitorTiming::from_config(&config.monitor),
    })
}

/// Holds `service.started` for this process. The entry stores the owner's
/// pid and is cleared on exit only while it still names that pid.
pub struct ServiceMarker<S: ChannelStore> {
    channel: Channel<S>,
    pid: u32,
}

impl<S: ChannelStore> Drop for ServiceMarker<S> {
    fn drop(&mut self) {
        match self.channel.read(keys::SERVICE_STARTED) {
            Ok(owner) if owner == self.pid.to_string() => {
                if let Err(err) = self.channel.clear(keys::SERVICE_STARTED) {
                    warn!(error = %err, "failed to clear service marker");
                }
            }
            Ok(owner) => debug!(owner = %owner, "service marker was taken over, leaving it"),
            Err(err) => warn!(error = %err, "failed to read service marker"),
        }
    }
}

/// Claims `service.started` for `pid`. A marker left by a process that is
/// no longer alive, or one without a pid, is taken over. Returns `None`
/// when a live coordinator already holds it.
pub fn claim_service_marker<S, F>(
    channel: &Channel<S>,
    pid: u32,
    is_alive: F,
) -> Result<Option<ServiceMarker<S>>>
where
    S: ChannelStore + Clone,
    F: Fn(u32) -> bool,
{
    let current = channel.read(keys::SERVICE_STARTED)?;
    if !current.is_empty() {
        match current.parse::<u32>() {
            // `1` is the pid-less marker format and never a coordinator.
            Ok(owner) if owner > 1 && is_alive(owner) => {
                info!(owner, "service already running, exiting");
                return Ok(None);
            }
            _ => warn!(marker = %current, "taking over stale service marker"),
        }
    }

    let value = pid.to_string();
    if !channel.write_synced(keys::SERVICE_STARTED, &value)? {
        warn!("service marker was not observed after writing");
    }
    Ok(Some(ServiceMarker {
        channel: channel.clone(),
        pid,
    }))
}

#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .stderr(Stdio::null())
        .output()
        .map(|output| String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()))
        .unwrap_or(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStart {
    Monitor,
    Managed,
    AutoCheckDisabled,
}

/// Runs the start-up duties that precede the update loop and decides whether
/// the loop runs at all.
pub fn prepare_service(
    settings: &Settings,
    config: &UpkeepConfig,
    host: &dyn HostControl,
) -> ServiceStart {
    if settings.kiosk_mode() {
        let delay = settings.kiosk_delay();
        info!(delay, "starting package from service (kiosk mode)");
        if let Err(err) = host.launch_entry_point(delay) {
            warn!(error = %format!("{err:#}"), "kiosk launch failed");
        }
    }

    if config.managed_install {
        info!("package is managed by the host repository, update loop disabled");
        return ServiceStart::Managed;
    }
    if !settings.auto_update_check() {
        info!("automatic update checks disabled");
        return ServiceStart::AutoCheckDisabled;
    }
    ServiceStart::Monitor
}

pub fn run_service(layout: &StateLayout, config: &UpkeepConfig) -> Result<()> {
    layout.ensure_base_dirs()?;

    let abort = AbortSignal::new();
    let handler_abort = abort.clone();
    ctrlc::set_handler(move || handler_abort.trigger())
        .context("failed to install shutdown handler")?;

    let channel = open_channel(layout, abort)?;
    let Some(_marker) = claim_service_marker(&channel, std::process::id(), process_alive)? else {
        return Ok(());
    };
    info!(root = %layout.root().display(), "service started");

    let settings = open_settings(layout)?;
    let host: Arc<dyn HostControl> = Arc::new(CommandHost::new(config.host.clone(), true));
    if prepare_service(&settings, config, host.as_ref()) != ServiceStart::Monitor {
        return Ok(());
    }

    let context = source_context(config, host)?;
    let (events, receiver) = mpsc::channel();
    let _watcher = spawn_sleep_watcher(channel.clone(), events, SLEEP_WATCH_INTERVAL);
    let mut monitor =
        build_monitor(layout, config, channel, settings, context)?.with_events(receiver);
    monitor.run();

    info!("service exited");
    Ok(())
}

/// Translates transitions of the `sleeping` entry into host events until the
/// channel's abort signal fires or the receiver goes away.
pub fn spawn_sleep_watcher<S>(
    channel: Channel<S>,
    events: Sender<HostEvent>,
    interval: Duration,
) -> JoinHandle<()>
where
    S: ChannelStore + 'static,
{
    thread::spawn(move || {
        let mut sleeping = false;
        loop {
            match channel.read_flag(keys::SLEEPING) {
                Ok(now) if now != sleeping => {
                    sleeping = now;
                    let event = if now { HostEvent::Sleep } else { HostEvent::Wake };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "failed to read sleep state"),
            }
            if channel.abort_signal().wait(interval) {
                break;
            }
        }
    })
}
