//! Spoken conversation pipeline
//!
//! Strictly linear: `Idle -> Listening -> Thinking -> Speaking -> Idle`.
//! Start is only accepted from `Idle` and stop only from `Listening`, so no
//! capture can begin until the previous reply has finished playing.

use super::TransitionResult;
use crate::message::Origin;
use crate::responder::VoiceReply;
use thiserror::Error;

/// Appended to the voice transcript when processing a capture fails
pub const VOICE_FALLBACK: &str = "Sorry, I couldn't make that out. Could you say it again?";

pub type VoiceTransition = TransitionResult<VoiceState, VoiceEffect>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening {
        capture_id: String,
    },
    Thinking,
    Speaking,
}

impl VoiceState {
    pub fn name(&self) -> &'static str {
        match self {
            VoiceState::Idle => "idle",
            VoiceState::Listening { .. } => "listening",
            VoiceState::Thinking => "thinking",
            VoiceState::Speaking => "speaking",
        }
    }

    /// The start/stop control is disabled while a reply is being produced or played
    pub fn control_enabled(&self) -> bool {
        matches!(self, VoiceState::Idle | VoiceState::Listening { .. })
    }
}

/// Status line shown beneath the voice transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceNotice {
    Listening,
    Processing,
    Speaking,
    PermissionDenied,
    ProcessingFailed,
}

impl VoiceNotice {
    pub fn text(self) -> &'static str {
        match self {
            VoiceNotice::Listening => "Listening... Speak now",
            VoiceNotice::Processing => "Processing your voice...",
            VoiceNotice::Speaking => "Speaking...",
            VoiceNotice::PermissionDenied => {
                "Microphone access denied. Please allow microphone permissions."
            }
            VoiceNotice::ProcessingFailed => "Something went wrong while processing your voice.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    StartRequested,
    MicrophoneGranted { capture_id: String },
    MicrophoneDenied { reason: String },
    StopRequested,
    ReplyReady { reply: VoiceReply },
    ProcessingFailed { message: String },
    PlaybackFinished,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEffect {
    /// Ask for the input device and open a capture session on success
    AcquireMicrophone,
    /// Close the capture session, release the device, hand the audio to the responder
    SubmitCapture,
    AppendMessage { origin: Origin, content: String },
    PlayReply { reply: VoiceReply },
    SetNotice(Option<VoiceNotice>),
    ClearLog,
    NotifyState,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceTransitionError {
    #[error("Voice session is {0}, start needs idle")]
    NotIdle(&'static str),
    #[error("Voice session is {0}, stop needs listening")]
    NotListening(&'static str),
    #[error("Voice session is busy")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function for the voice controller
pub fn transition(
    state: &VoiceState,
    event: VoiceEvent,
) -> Result<VoiceTransition, VoiceTransitionError> {
    match (state, event) {
        // Idle stays idle until the device answers; the runtime resolves
        // AcquireMicrophone before looking at any other queued input.
        (VoiceState::Idle, VoiceEvent::StartRequested) => {
            Ok(TransitionResult::new(VoiceState::Idle).with_effect(VoiceEffect::AcquireMicrophone))
        }

        (_, VoiceEvent::StartRequested) => Err(VoiceTransitionError::NotIdle(state.name())),

        (VoiceState::Idle, VoiceEvent::MicrophoneGranted { capture_id }) => {
            Ok(TransitionResult::new(VoiceState::Listening { capture_id })
                .with_effect(VoiceEffect::SetNotice(Some(VoiceNotice::Listening)))
                .with_effect(VoiceEffect::NotifyState))
        }

        (VoiceState::Idle, VoiceEvent::MicrophoneDenied { .. }) => Ok(TransitionResult::new(
            VoiceState::Idle,
        )
        .with_effect(VoiceEffect::SetNotice(Some(VoiceNotice::PermissionDenied)))),

        (VoiceState::Listening { .. }, VoiceEvent::StopRequested) => {
            Ok(TransitionResult::new(VoiceState::Thinking)
                .with_effect(VoiceEffect::SubmitCapture)
                .with_effect(VoiceEffect::SetNotice(Some(VoiceNotice::Processing)))
                .with_effect(VoiceEffect::NotifyState))
        }

        (_, VoiceEvent::StopRequested) => Err(VoiceTransitionError::NotListening(state.name())),

        (VoiceState::Thinking, VoiceEvent::ReplyReady { reply }) => {
            Ok(TransitionResult::new(VoiceState::Speaking)
                .with_effect(VoiceEffect::AppendMessage {
                    origin: Origin::Assistant,
                    content: reply.text.clone(),
                })
                .with_effect(VoiceEffect::SetNotice(Some(VoiceNotice::Speaking)))
                .with_effect(VoiceEffect::NotifyState)
                .with_effect(VoiceEffect::PlayReply { reply }))
        }

        (VoiceState::Thinking, VoiceEvent::ProcessingFailed { .. }) => {
            Ok(TransitionResult::new(VoiceState::Idle)
                .with_effect(VoiceEffect::AppendMessage {
                    origin: Origin::SystemError,
                    content: VOICE_FALLBACK.to_string(),
                })
                .with_effect(VoiceEffect::SetNotice(Some(VoiceNotice::ProcessingFailed)))
                .with_effect(VoiceEffect::NotifyState))
        }

        (VoiceState::Speaking, VoiceEvent::PlaybackFinished) => {
            Ok(TransitionResult::new(VoiceState::Idle)
                .with_effect(VoiceEffect::SetNotice(None))
                .with_effect(VoiceEffect::NotifyState))
        }

        (VoiceState::Idle, VoiceEvent::Reset) => Ok(TransitionResult::new(VoiceState::Idle)
            .with_effect(VoiceEffect::ClearLog)
            .with_effect(VoiceEffect::SetNotice(None))),

        (_, VoiceEvent::Reset) => Err(VoiceTransitionError::Busy),

        (state, event) => Err(VoiceTransitionError::InvalidTransition(format!(
            "No transition from {} with event {event:?}",
            state.name()
        ))),
    }
}
