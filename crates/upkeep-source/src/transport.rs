use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::debug;
use upkeep_core::{Transport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub check_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("upkeep/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            check_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(300),
        }
    }
}

/// Blocking HTTP transport. Metadata requests and archive downloads use
/// separate clients so each gets its own overall timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    check_client: Client,
    download_client: Client,
}

impl HttpTransport {
    pub fn new(options: &HttpOptions) -> Result<Self> {
        let build = |timeout: Duration| {
            Client::builder()
                .user_agent(options.user_agent.clone())
                .connect_timeout(options.connect_timeout)
                .timeout(timeout)
                .build()
                .context("failed to build HTTP client")
        };
        Ok(Self {
            check_client: build(options.check_timeout)?,
            download_client: build(options.download_timeout)?,
        })
    }
}

fn request_error(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        source: anyhow::Error::new(err),
    }
}

impl Transport for HttpTransport {
    fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .check_client
            .get(url)
            .send()
            .map_err(|err| request_error(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(|err| request_error(url, err))
    }

    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let mut response = self
            .download_client
            .get(url)
            .send()
            .map_err(|err| request_error(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| TransportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = fs::File::create(dest).map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        let written = response
            .copy_to(&mut file)
            .map_err(|err| request_error(url, err))?;
        file.flush().map_err(|source| TransportError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        debug!(url, bytes = written, path = %dest.display(), "downloaded");
        Ok(written)
    }
}
