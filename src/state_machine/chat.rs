//! Typed chat turn-taking
//!
//! At most one request is in flight: a submission is only accepted from
//! `Idle`, and the runtime only returns to `Idle` after the assistant reply
//! (or the fallback) has been appended.

use super::TransitionResult;
use crate::message::{DeliveryState, Origin};
use thiserror::Error;

/// Shown in place of a reply whenever the remote responder fails
pub const FALLBACK_REPLY: &str =
    "Hmm, I'm having trouble connecting right now. Could you try again? 💫";

pub type ChatTransition = TransitionResult<ChatState, ChatEffect>;

/// Progress of an outstanding turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitPhase {
    /// Liveness delay running, typing indicator shown
    Typing,
    /// Request sent to the responder
    Requesting,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatState {
    #[default]
    Idle,
    AwaitingResponse { text: String, phase: AwaitPhase },
}

impl ChatState {
    /// The typing indicator. Derived from state, so it cannot outlive a turn.
    pub fn is_typing(&self) -> bool {
        matches!(
            self,
            ChatState::AwaitingResponse {
                phase: AwaitPhase::Typing,
                ..
            }
        )
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, ChatState::AwaitingResponse { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatState::Idle => "idle",
            ChatState::AwaitingResponse { .. } => "awaiting_response",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Submit { text: String },
    TypingElapsed,
    ResponseReceived { text: String },
    ResponseFailed { message: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEffect {
    /// Build and append a complete message to the log
    AppendMessage {
        origin: Origin,
        content: String,
        delivery: Option<DeliveryState>,
    },
    /// Start the randomized liveness delay
    ScheduleTyping,
    /// Send one request to the remote responder
    RequestResponse { text: String },
    ClearLog,
    /// Publish the new state to subscribers
    NotifyState,
    /// The in-flight turn has resolved
    NotifySettled,
}

impl ChatEffect {
    fn user_message(content: String) -> Self {
        ChatEffect::AppendMessage {
            origin: Origin::User,
            content,
            delivery: Some(DeliveryState::Delivered),
        }
    }

    fn assistant_message(content: String) -> Self {
        ChatEffect::AppendMessage {
            origin: Origin::Assistant,
            content,
            delivery: Some(DeliveryState::Read),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatTransitionError {
    #[error("Empty message ignored")]
    EmptyInput,
    #[error("A reply is still pending")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function for the chat controller
pub fn transition(
    state: &ChatState,
    event: ChatEvent,
) -> Result<ChatTransition, ChatTransitionError> {
    match (state, event) {
        (ChatState::Idle, ChatEvent::Submit { text }) if text.trim().is_empty() => {
            Err(ChatTransitionError::EmptyInput)
        }

        (ChatState::Idle, ChatEvent::Submit { text }) => Ok(TransitionResult::new(
            ChatState::AwaitingResponse {
                text: text.clone(),
                phase: AwaitPhase::Typing,
            },
        )
        .with_effect(ChatEffect::user_message(text))
        .with_effect(ChatEffect::NotifyState)
        .with_effect(ChatEffect::ScheduleTyping)),

        (ChatState::AwaitingResponse { .. }, ChatEvent::Submit { .. } | ChatEvent::Reset) => {
            Err(ChatTransitionError::Busy)
        }

        (
            ChatState::AwaitingResponse {
                text,
                phase: AwaitPhase::Typing,
            },
            ChatEvent::TypingElapsed,
        ) => Ok(TransitionResult::new(ChatState::AwaitingResponse {
            text: text.clone(),
            phase: AwaitPhase::Requesting,
        })
        .with_effect(ChatEffect::NotifyState)
        .with_effect(ChatEffect::RequestResponse { text: text.clone() })),

        (
            ChatState::AwaitingResponse {
                phase: AwaitPhase::Requesting,
                ..
            },
            ChatEvent::ResponseReceived { text },
        ) => Ok(settle(text)),

        (
            ChatState::AwaitingResponse {
                phase: AwaitPhase::Requesting,
                ..
            },
            ChatEvent::ResponseFailed { .. },
        ) => Ok(settle(FALLBACK_REPLY.to_string())),

        (ChatState::Idle, ChatEvent::Reset) => Ok(TransitionResult::new(ChatState::Idle)
            .with_effect(ChatEffect::ClearLog)
            .with_effect(ChatEffect::NotifyState)),

        (state, event) => Err(ChatTransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.name()
        ))),
    }
}

fn settle(reply: String) -> ChatTransition {
    TransitionResult::new(ChatState::Idle)
        .with_effect(ChatEffect::assistant_message(reply))
        .with_effect(ChatEffect::NotifyState)
        .with_effect(ChatEffect::NotifySettled)
}
