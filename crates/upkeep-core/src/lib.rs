mod error;
mod host;
mod major;
mod mode;
mod transport;
mod version;

pub use error::{TransportError, UpdateError};
pub use host::{HostControl, PipelineStage};
pub use major::MajorChange;
pub use mode::{Branch, UpdateMode};
pub use transport::Transport;
pub use version::VersionId;

#[cfg(test)]
mod tests;
