mod config;
mod host;
mod layout;
mod logging;
mod monitor;
mod service;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use upkeep_channel::{AbortSignal, Decision, ForegroundEndpoint, PollPolicy};
use upkeep_core::UpdateMode;
use upkeep_source::{registered_modes, resolve_source};

use crate::config::UpkeepConfig;
use crate::host::CommandHost;
use crate::layout::StateLayout;
use crate::service::{installed_version, open_channel, open_settings, run_service, source_context};
use crate::settings::UPDATE_SOURCE;

#[derive(Parser, Debug)]
#[command(name = "upkeep")]
#[command(about = "Self-update coordinator for an installed host package", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    state_root: Option<PathBuf>,
    /// Log filter directives, e.g. `debug` or `upkeep_channel=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the background coordinator until the host shuts down.
    Service,
    /// Check the active source once without negotiating or installing.
    Check {
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        allow_downgrade: bool,
    },
    /// Answer a pending update offer.
    Respond { decision: ResponseArg },
    /// Answer a pending major-change prompt.
    ConfirmMajor { answer: AnswerArg },
    /// Persist a new update source and ask the coordinator to switch.
    SwitchSource { mode: String },
    #[command(subcommand)]
    Channel(ChannelCommand),
    Doctor,
}

#[derive(Subcommand, Debug)]
enum ChannelCommand {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        /// Re-read until the value is observed.
        #[arg(long)]
        sync: bool,
    },
    Clear {
        key: String,
    },
    WaitEmpty {
        key: String,
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
        #[arg(long, default_value_t = 36_000)]
        timeout_polls: u32,
    },
    Dump {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResponseArg {
    Commence,
    Decline,
}

impl From<ResponseArg> for Decision {
    fn from(value: ResponseArg) -> Self {
        match value {
            ResponseArg::Commence => Decision::Commence,
            ResponseArg::Decline => Decision::Decline,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnswerArg {
    Yes,
    No,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let layout = StateLayout::resolve(cli.state_root.as_deref())?;
    let config = UpkeepConfig::load(&layout.config_path())?;
    logging::init(cli.log_level.as_deref(), config.log_file.as_deref())?;

    run_cli(cli.command, &layout, &config)
}

fn run_cli(command: Commands, layout: &StateLayout, config: &UpkeepConfig) -> Result<()> {
    match command {
        Commands::Service => run_service(layout, config)?,
        Commands::Check {
            mode,
            allow_downgrade,
        } => {
            let settings = open_settings(layout)?;
            let host = Arc::new(CommandHost::new(config.host.clone(), false));
            let context = source_context(config, host)?;
            let mode = mode.unwrap_or_else(|| settings.update_source());
            let mut source = resolve_source(&mode, &context)?;
            let current = installed_version(config)?.resolve()?;

            match source.check(&current, allow_downgrade)? {
                Some(version) => {
                    let note = if source.is_downgrade() { " (downgrade)" } else { "" };
                    println!("update available: {current} -> {version}{note}");
                    if let Some(url) = source.download_url() {
                        println!("download: {url}");
                    }
                }
                None => println!("up to date: {current} ({})", source.mode()),
            }
        }
        Commands::Respond { decision } => {
            let endpoint = foreground(layout)?;
            let decision = Decision::from(decision);
            endpoint.respond(decision)?;
            println!("responded: {}", decision.as_token());
        }
        Commands::ConfirmMajor { answer } => {
            let endpoint = foreground(layout)?;
            endpoint.acknowledge_major_change(matches!(answer, AnswerArg::Yes))?;
        }
        Commands::SwitchSource { mode } => {
            let parsed = UpdateMode::parse(&mode).ok_or_else(|| {
                let known = registered_modes()
                    .map(UpdateMode::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                anyhow!("unknown update source '{mode}'; expected one of: {known}")
            })?;
            open_settings(layout)?.set_string(UPDATE_SOURCE, parsed.as_str())?;
            foreground(layout)?.request_source_change(parsed)?;
            println!("update source: {parsed}");
        }
        Commands::Channel(command) => run_channel_command(command, layout)?,
        Commands::Doctor => {
            println!("state root: {}", layout.root().display());
            println!("config: {}", layout.config_path().display());
            println!("settings: {}", layout.settings_path().display());
            println!("channel: {}", layout.channel_dir().display());
            println!("scratch: {}", config.scratch_dir(layout).display());
            match config.install_root() {
                Ok(root) => println!("install dir: {}", root.join(&config.package_id).display()),
                Err(err) => println!("install dir: unresolved ({err:#})"),
            }
            let branch = config.branch();
            println!("branch: {} ({})", branch.name, branch.codename);
            let settings = open_settings(layout)?;
            println!("update source: {}", settings.update_source());
            println!("auto update check: {}", settings.auto_update_check());
            match installed_version(config).and_then(|installed| installed.resolve()) {
                Ok(version) => println!("installed version: {version}"),
                Err(err) => println!("installed version: unknown ({err:#})"),
            }
            println!();
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn foreground(
    layout: &StateLayout,
) -> Result<ForegroundEndpoint<Arc<upkeep_channel::FileStore>>> {
    Ok(ForegroundEndpoint::new(open_channel(
        layout,
        AbortSignal::new(),
    )?))
}

fn run_channel_command(command: ChannelCommand, layout: &StateLayout) -> Result<()> {
    let channel = open_channel(layout, AbortSignal::new())?;
    match command {
        ChannelCommand::Get { key } => println!("{}", channel.read(&key)?),
        ChannelCommand::Set { key, value, sync } => {
            if sync {
                if !channel.write_synced(&key, &value)? {
                    eprintln!("warning: '{key}' was overwritten before the write was observed");
                }
            } else {
                channel.write(&key, &value)?;
            }
        }
        ChannelCommand::Clear { key } => channel.clear(&key)?,
        ChannelCommand::WaitEmpty {
            key,
            interval_ms,
            timeout_polls,
        } => {
            channel
                .wait_for_empty(
                    &key,
                    PollPolicy::new(Duration::from_millis(interval_ms), timeout_polls),
                )
                .with_context(|| format!("'{key}' did not clear"))?;
        }
        ChannelCommand::Dump { json } => {
            let entries = channel.snapshot()?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).context("failed to render entries")?
                );
            } else {
                for (key, value) in entries {
                    println!("{key}={value}");
                }
            }
        }
    }
    Ok(())
}
