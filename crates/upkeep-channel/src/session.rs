use upkeep_core::{MajorChange, UpdateMode};

use crate::channel::{Channel, ChannelError, PollPolicy, ReadOptions};
use crate::keys;
use crate::store::ChannelStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub version: String,
    pub is_downgrade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Commence,
    Decline,
}

impl Decision {
    /// Anything other than the literal `commence` token declines.
    pub fn from_token(token: &str) -> Self {
        if token == keys::COMMENCE {
            Self::Commence
        } else {
            Self::Decline
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Self::Commence => keys::COMMENCE,
            Self::Decline => "decline",
        }
    }
}

/// Everything the two processes say to each other, mapped onto fixed
/// channel entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Offer(Offer),
    Decision(Decision),
    MajorChange(MajorChange),
    MajorChangeAck(bool),
    SourceChange(UpdateMode),
}

impl Message {
    /// Entries carrying this message, in write order. The last entry is the
    /// one the receiver waits on.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Offer(offer) => vec![
                (
                    keys::UPDATE_IS_DOWNGRADE,
                    if offer.is_downgrade { "1" } else { "" }.to_string(),
                ),
                (keys::UPDATE_AVAILABLE, offer.version.clone()),
            ],
            Self::Decision(decision) => {
                vec![(keys::UPDATE_RESPONSE, decision.as_token().to_string())]
            }
            Self::MajorChange(kind) => {
                vec![(keys::UPDATE_MAJOR_CHANGE, kind.as_str().to_string())]
            }
            Self::MajorChangeAck(launch) => vec![(
                keys::UPDATE_MAJOR_CHANGE_RESPONSE,
                if *launch { "1" } else { "0" }.to_string(),
            )],
            Self::SourceChange(mode) => {
                vec![(keys::UPDATE_SOURCE_CHANGED, mode.as_str().to_string())]
            }
        }
    }
}

/// Foreground state as seen from the background process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStatus {
    pub running: bool,
    pub started: bool,
    pub is_active: bool,
    pub waiting_for_start: bool,
    pub active_window: String,
}

impl HostStatus {
    pub fn ready_for_check(&self) -> bool {
        self.running && self.started && self.is_active && !self.waiting_for_start
    }
}

/// Background side of the negotiation: writes offers, reads decisions.
#[derive(Debug, Clone)]
pub struct BackgroundEndpoint<S> {
    channel: Channel<S>,
}

impl<S: ChannelStore> BackgroundEndpoint<S> {
    pub fn new(channel: Channel<S>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Channel<S> {
        &self.channel
    }

    pub fn send(&self, message: &Message) -> Result<(), ChannelError> {
        for (key, value) in message.entries() {
            self.channel.write(key, &value)?;
        }
        Ok(())
    }

    pub fn host_status(&self) -> Result<HostStatus, ChannelError> {
        Ok(HostStatus {
            running: self.channel.read_flag(keys::RUNNING)?,
            started: self.channel.read_flag(keys::STARTED)?,
            is_active: self.channel.read_flag(keys::IS_ACTIVE)?,
            waiting_for_start: self.channel.read_flag(keys::WAITING_FOR_START)?,
            active_window: self.channel.read(keys::ACTIVE_WINDOW)?,
        })
    }

    /// Consumes a pending distribution-channel switch, if any. The raw value is
    /// returned so the caller can report unknown modes.
    pub fn take_source_change(&self) -> Result<Option<String>, ChannelError> {
        let value = self.channel.consume(keys::UPDATE_SOURCE_CHANGED)?;
        Ok(Some(value).filter(|value| !value.is_empty()))
    }

    pub fn await_decision(&self, policy: PollPolicy) -> Result<Decision, ChannelError> {
        let token = self.channel.read_with(
            keys::UPDATE_RESPONSE,
            ReadOptions {
                consume: true,
                wait: Some(policy),
            },
        )?;
        Ok(Decision::from_token(&token))
    }

    /// Blocks until the foreground process has dropped its `running` marker.
    pub fn await_quiescence(&self, policy: PollPolicy) -> Result<(), ChannelError> {
        self.channel.wait_for_empty(keys::RUNNING, policy)
    }

    pub fn await_major_change_ack(&self, policy: PollPolicy) -> Result<bool, ChannelError> {
        let token = self.channel.read_with(
            keys::UPDATE_MAJOR_CHANGE_RESPONSE,
            ReadOptions {
                consume: true,
                wait: Some(policy),
            },
        )?;
        Ok(token == "1")
    }

    pub fn clear_session(&self) {
        self.channel.clear_all(&keys::SESSION_KEYS);
    }
}

/// Foreground side: publishes host state and answers offers.
#[derive(Debug, Clone)]
pub struct ForegroundEndpoint<S> {
    channel: Channel<S>,
}

impl<S: ChannelStore> ForegroundEndpoint<S> {
    pub fn new(channel: Channel<S>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Channel<S> {
        &self.channel
    }

    pub fn pending_offer(&self) -> Result<Option<Offer>, ChannelError> {
        let version = self.channel.read(keys::UPDATE_AVAILABLE)?;
        if version.is_empty() {
            return Ok(None);
        }
        Ok(Some(Offer {
            version,
            is_downgrade: self.channel.read_flag(keys::UPDATE_IS_DOWNGRADE)?,
        }))
    }

    pub fn respond(&self, decision: Decision) -> Result<(), ChannelError> {
        self.send(&Message::Decision(decision))
    }

    pub fn request_source_change(&self, mode: UpdateMode) -> Result<(), ChannelError> {
        self.send(&Message::SourceChange(mode))
    }

    pub fn pending_major_change(&self) -> Result<Option<MajorChange>, ChannelError> {
        let tag = self.channel.read(keys::UPDATE_MAJOR_CHANGE)?;
        Ok(MajorChange::parse(&tag).filter(|kind| kind.is_major()))
    }

    pub fn acknowledge_major_change(&self, launch: bool) -> Result<(), ChannelError> {
        self.send(&Message::MajorChangeAck(launch))
    }

    pub fn set_running(&self, running: bool) -> Result<(), ChannelError> {
        self.channel.write_flag(keys::RUNNING, running)
    }

    pub fn set_started(&self, started: bool) -> Result<(), ChannelError> {
        self.channel.write_flag(keys::STARTED, started)
    }

    pub fn set_active(&self, active: bool) -> Result<(), ChannelError> {
        self.channel.write_flag(keys::IS_ACTIVE, active)
    }

    pub fn set_waiting_for_start(&self, waiting: bool) -> Result<(), ChannelError> {
        self.channel.write_flag(keys::WAITING_FOR_START, waiting)
    }

    pub fn set_active_window(&self, window: &str) -> Result<(), ChannelError> {
        self.channel.write(keys::ACTIVE_WINDOW, window)
    }

    fn send(&self, message: &Message) -> Result<(), ChannelError> {
        for (key, value) in message.entries() {
            self.channel.write(key, &value)?;
        }
        Ok(())
    }
}
