//! Conversation state machines
//!
//! Both controllers follow the Elm Architecture pattern: a pure transition
//! function maps (state, event) to a new state plus effects for the runtime.

pub mod chat;
mod transition;
pub mod voice;

#[cfg(test)]
mod proptests;

pub use chat::{ChatEffect, ChatEvent, ChatState};
pub use transition::TransitionResult;
pub use voice::{VoiceEffect, VoiceEvent, VoiceNotice, VoiceState};
