use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed writing {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Recoverable failures of one update session. The monitor loop logs these
/// and moves on to the next tick.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("update check failed: {0}")]
    CheckFailed(String),
    #[error("update download failed: {message}{}", status_suffix(.status))]
    DownloadFailed {
        message: String,
        status: Option<u16>,
    },
    #[error("update unpack failed")]
    UnpackFailed {
        #[source]
        source: anyhow::Error,
    },
    #[error("update install failed")]
    InstallFailed {
        #[source]
        source: anyhow::Error,
    },
    #[error("no user response")]
    NoUserResponse,
    #[error("timed out waiting for the host to close")]
    HostStillRunning,
    #[error("aborted by host shutdown")]
    Aborted,
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl UpdateError {
    pub fn download(err: TransportError) -> Self {
        let status = err.status();
        let message = match std::error::Error::source(&err) {
            Some(source) => format!("{err}: {source}"),
            None => err.to_string(),
        };
        Self::DownloadFailed { message, status }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::DownloadFailed { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}
