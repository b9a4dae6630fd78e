//! Runtimes for the chat and voice controllers
//!
//! Each runtime is a single task that owns its state machine, its log and
//! (for voice) the capture session. Handles send commands in; results of
//! background work come back as events on an internal channel, so every
//! transition happens on that one task. Nothing in flight is cancellable.

mod chat;
pub mod traits;
mod voice;

#[cfg(test)]
pub mod testing;

pub use chat::{ChatHandle, ChatRuntime, LivenessDelay};
pub use traits::*;
pub use voice::{VoiceHandle, VoiceRuntime};

use crate::message::Message;
use crate::state_machine::{ChatState, VoiceNotice, VoiceState};
use thiserror::Error;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Returned by handles once the runtime task has gone away
#[derive(Debug, Error)]
#[error("Controller runtime has stopped")]
pub struct RuntimeStopped;

/// Updates published by the chat runtime
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    StateChange { state: ChatState, typing: bool },
    Message { message: Message },
    /// The outstanding turn resolved, with a reply or the fallback
    Settled,
    Cleared,
    /// Input ignored by a transition guard
    Rejected { reason: String },
}

/// Updates published by the voice runtime
#[derive(Debug, Clone)]
pub enum VoiceUpdate {
    StateChange { state: VoiceState },
    Message { message: Message },
    Notice { notice: Option<VoiceNotice> },
    Cleared,
    Rejected { reason: String },
}
