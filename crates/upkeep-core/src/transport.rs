use std::path::Path;

use crate::error::TransportError;

/// Network access used by update sources (metadata) and the archive pipeline
/// (payload). Implementations must apply connect/read timeouts.
pub trait Transport: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, TransportError>;

    /// Streams `url` into `dest`, returning the number of bytes written.
    /// `dest` is only created once the remote answered with a success status.
    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError>;
}
