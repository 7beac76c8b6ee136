use std::process::Command;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use upkeep_core::{HostControl, PipelineStage};

use crate::config::HostCommands;

/// Bridges the opaque host primitives onto configured shell commands and
/// renders pipeline progress on the terminal.
pub struct CommandHost {
    commands: HostCommands,
    progress: Mutex<Option<ProgressBar>>,
    show_progress: bool,
}

impl CommandHost {
    pub fn new(commands: HostCommands, show_progress: bool) -> Self {
        Self {
            commands,
            progress: Mutex::new(None),
            show_progress,
        }
    }

    fn run(&self, label: &str, command_line: &str) -> Result<()> {
        if command_line.trim().is_empty() {
            debug!(command = label, "no host command configured, skipping");
            return Ok(());
        }
        debug!(command = label, line = command_line, "running host command");
        run_command(
            &mut shell_command(command_line),
            &format!("host command '{label}' failed"),
        )
    }
}

impl HostControl for CommandHost {
    fn refresh_repositories(&self) -> Result<()> {
        self.run("refresh_repositories", &self.commands.refresh_repositories)
    }

    fn refresh_local_packages(&self) -> Result<()> {
        self.run("refresh_local_packages", &self.commands.refresh_local_packages)
    }

    fn activate_home(&self) -> Result<()> {
        self.run("activate_home", &self.commands.activate_home)
    }

    fn launch_entry_point(&self, delay_secs: u64) -> Result<()> {
        let line = self
            .commands
            .launch_entry_point
            .replace("{delay}", &delay_secs.to_string());
        self.run("launch_entry_point", &line)
    }

    fn is_playing(&self) -> bool {
        let check = self.commands.playing_check.trim();
        if check.is_empty() {
            return false;
        }
        match shell_command(check).output() {
            Ok(output) => output.status.success(),
            Err(err) => {
                debug!(error = %err, "playing check failed to start");
                false
            }
        }
    }

    fn report_progress(&self, stage: PipelineStage) {
        if !self.show_progress {
            return;
        }
        let mut slot = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        let bar = slot.get_or_insert_with(|| {
            let bar = ProgressBar::new(100);
            if let Ok(style) =
                ProgressStyle::with_template("{spinner:.cyan.bold} Update {msg:<20} [{bar:20.cyan/blue}] {pos:>3}%")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        bar.set_position(u64::from(stage.percent()));
        bar.set_message(stage.label());
    }

    fn finish_progress(&self) {
        let mut slot = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = slot.take() {
            bar.finish_and_clear();
        }
    }
}

fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(command_line);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        command
    }
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
