use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::abort::AbortSignal;
use crate::store::ChannelStore;

/// How long [`Channel::write_synced`] keeps re-reading its own write.
pub const SYNC_WRITE_WINDOW: Duration = Duration::from_secs(2);

const SYNC_WRITE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("timed out after {polls} polls waiting on '{key}'")]
    Timeout { key: String, polls: u32 },
    #[error("wait on '{key}' aborted by host shutdown")]
    Aborted { key: String },
    #[error("channel store failed for '{key}'")]
    Store {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ChannelError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Bounded polling: sleep `interval` between reads, give up after
/// `timeout_polls` reads that did not satisfy the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout_polls: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout_polls: u32) -> Self {
        Self {
            interval,
            timeout_polls,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 36_000)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Clear the entry after a non-empty read.
    pub consume: bool,
    /// Block until the entry is non-empty.
    pub wait: Option<PollPolicy>,
}

#[derive(Debug, Clone)]
pub struct Channel<S> {
    store: S,
    abort: AbortSignal,
}

impl<S: ChannelStore> Channel<S> {
    pub fn new(store: S, abort: AbortSignal) -> Self {
        Self { store, abort }
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn write(&self, key: &str, value: &str) -> Result<(), ChannelError> {
        self.store.set(key, value).map_err(|source| ChannelError::Store {
            key: key.to_string(),
            source,
        })
    }

    pub fn write_flag(&self, key: &str, flag: bool) -> Result<(), ChannelError> {
        self.write(key, if flag { "1" } else { "" })
    }

    pub fn clear(&self, key: &str) -> Result<(), ChannelError> {
        self.write(key, "")
    }

    /// Writes `value`, then re-reads the entry for up to [`SYNC_WRITE_WINDOW`]
    /// until it matches. Returns whether the value was observed; a mismatch
    /// means another writer got in first and is not an error.
    pub fn write_synced(&self, key: &str, value: &str) -> Result<bool, ChannelError> {
        self.write(key, value)?;
        let attempts = (SYNC_WRITE_WINDOW.as_millis() / SYNC_WRITE_INTERVAL.as_millis()) as u32;
        for _ in 0..attempts {
            if self.read(key)? == value {
                return Ok(true);
            }
            if self.abort.wait(SYNC_WRITE_INTERVAL) {
                break;
            }
        }
        let observed = self.read(key)? == value;
        if !observed {
            debug!(key, "synced write was not observed");
        }
        Ok(observed)
    }

    pub fn read(&self, key: &str) -> Result<String, ChannelError> {
        self.store.get(key).map_err(|source| ChannelError::Store {
            key: key.to_string(),
            source,
        })
    }

    pub fn read_flag(&self, key: &str) -> Result<bool, ChannelError> {
        Ok(!self.read(key)?.is_empty())
    }

    pub fn consume(&self, key: &str) -> Result<String, ChannelError> {
        self.read_with(
            key,
            ReadOptions {
                consume: true,
                wait: None,
            },
        )
    }

    pub fn read_with(&self, key: &str, options: ReadOptions) -> Result<String, ChannelError> {
        let value = match options.wait {
            Some(policy) => self.wait_for_value(key, policy)?,
            None => self.read(key)?,
        };
        if options.consume && !value.is_empty() {
            self.clear(key)?;
        }
        Ok(value)
    }

    /// Polls until `key` holds a non-empty value.
    pub fn wait_for_value(&self, key: &str, policy: PollPolicy) -> Result<String, ChannelError> {
        let mut polls = 0_u32;
        loop {
            let value = self.read(key)?;
            if !value.is_empty() {
                return Ok(value);
            }
            self.sleep_poll(key, policy, &mut polls)?;
        }
    }

    /// Polls until `key` is empty.
    pub fn wait_for_empty(&self, key: &str, policy: PollPolicy) -> Result<(), ChannelError> {
        let mut polls = 0_u32;
        loop {
            if self.read(key)?.is_empty() {
                return Ok(());
            }
            self.sleep_poll(key, policy, &mut polls)?;
        }
    }

    fn sleep_poll(&self, key: &str, policy: PollPolicy, polls: &mut u32) -> Result<(), ChannelError> {
        if *polls >= policy.timeout_polls {
            return Err(ChannelError::Timeout {
                key: key.to_string(),
                polls: *polls,
            });
        }
        if self.abort.wait(policy.interval) {
            return Err(ChannelError::Aborted {
                key: key.to_string(),
            });
        }
        *polls += 1;
        Ok(())
    }

    /// Resets every key in `keys`, logging instead of failing.
    pub fn clear_all(&self, keys: &[&str]) {
        for key in keys {
            if let Err(err) = self.clear(key) {
                warn!(key, error = %err, "failed to clear channel entry");
            }
        }
    }

    pub fn snapshot(&self) -> Result<BTreeMap<String, String>, ChannelError> {
        self.store.entries().map_err(|source| ChannelError::Store {
            key: "*".to_string(),
            source,
        })
    }
}
