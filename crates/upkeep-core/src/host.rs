/// Opaque commands the coordinator issues to the host environment. The core
/// never implements these, it only decides when to call them.
pub trait HostControl: Send + Sync {
    fn refresh_repositories(&self) -> anyhow::Result<()>;

    fn refresh_local_packages(&self) -> anyhow::Result<()>;

    fn activate_home(&self) -> anyhow::Result<()>;

    fn launch_entry_point(&self, delay_secs: u64) -> anyhow::Result<()>;

    fn is_playing(&self) -> bool;

    fn report_progress(&self, _stage: PipelineStage) {}

    fn finish_progress(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Downloading,
    Unpacking,
    Installing,
    CleaningUp,
    PreparingToStart,
}

impl PipelineStage {
    pub fn percent(self) -> u8 {
        match self {
            Self::Downloading => 0,
            Self::Unpacking => 25,
            Self::Installing => 50,
            Self::CleaningUp => 75,
            Self::PreparingToStart => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Downloading => "Downloading",
            Self::Unpacking => "Unpacking",
            Self::Installing => "Installing",
            Self::CleaningUp => "Cleaning up",
            Self::PreparingToStart => "Preparing to start",
        }
    }
}
