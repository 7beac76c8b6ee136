//! Shared State Channel: a polled, string-keyed mailbox shared by the
//! foreground and background processes.

mod abort;
mod channel;
pub mod keys;
mod session;
mod store;

pub use abort::AbortSignal;
pub use channel::{Channel, ChannelError, PollPolicy, ReadOptions, SYNC_WRITE_WINDOW};
pub use session::{BackgroundEndpoint, Decision, ForegroundEndpoint, HostStatus, Message, Offer};
pub use store::{ChannelStore, FileStore, MemoryStore};

#[cfg(test)]
mod tests;
