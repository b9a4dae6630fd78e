//! Property-based tests for the state machines
//!
//! These tests drive both machines with arbitrary event sequences and check
//! the invariants that must hold whatever the input order.

use super::chat::{self, ChatEffect, ChatEvent, ChatState};
use super::voice::{self, VoiceEffect, VoiceEvent, VoiceState};
use crate::message::Origin;
use crate::responder::VoiceReply;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t\n]{1,4}",
        "[a-zA-Z][a-zA-Z ]{0,20}",
    ]
}

fn arb_chat_event() -> impl Strategy<Value = ChatEvent> {
    prop_oneof![
        arb_text().prop_map(|text| ChatEvent::Submit { text }),
        Just(ChatEvent::TypingElapsed),
        "[a-z ]{1,20}".prop_map(|text| ChatEvent::ResponseReceived { text }),
        "[a-z ]{1,20}".prop_map(|message| ChatEvent::ResponseFailed { message }),
        Just(ChatEvent::Reset),
    ]
}

fn arb_voice_event() -> impl Strategy<Value = VoiceEvent> {
    prop_oneof![
        Just(VoiceEvent::StartRequested),
        "[a-z0-9]{8}".prop_map(|capture_id| VoiceEvent::MicrophoneGranted { capture_id }),
        "[a-zA-Z]{1,12}".prop_map(|reason| VoiceEvent::MicrophoneDenied { reason }),
        Just(VoiceEvent::StopRequested),
        "[a-z ]{1,20}".prop_map(|text| VoiceEvent::ReplyReady {
            reply: VoiceReply { text, audio: None }
        }),
        "[a-z ]{1,20}".prop_map(|message| VoiceEvent::ProcessingFailed { message }),
        Just(VoiceEvent::PlaybackFinished),
        Just(VoiceEvent::Reset),
    ]
}

// ============================================================================
// Chat Properties
// ============================================================================

fn appended_origins(effects: &[ChatEffect]) -> Vec<Origin> {
    effects
        .iter()
        .filter_map(|e| match e {
            ChatEffect::AppendMessage { origin, .. } => Some(*origin),
            _ => None,
        })
        .collect()
}

proptest! {
    /// Rejected events never change state and never produce effects
    #[test]
    fn prop_chat_rejections_are_noops(events in prop::collection::vec(arb_chat_event(), 1..40)) {
        let mut state = ChatState::Idle;
        for event in events {
            let before = state.clone();
            match chat::transition(&state, event) {
                Ok(result) => state = result.new_state,
                Err(_) => prop_assert_eq!(&state, &before),
            }
        }
    }

    /// User and assistant messages strictly alternate, starting with the user
    #[test]
    fn prop_chat_messages_alternate(events in prop::collection::vec(arb_chat_event(), 1..60)) {
        let mut state = ChatState::Idle;
        let mut origins = Vec::new();
        for event in events {
            if let Ok(result) = chat::transition(&state, event) {
                if result.effects.contains(&ChatEffect::ClearLog) {
                    origins.clear();
                }
                origins.extend(appended_origins(&result.effects));
                state = result.new_state;
            }
        }

        for (i, origin) in origins.iter().enumerate() {
            let expected = if i % 2 == 0 { Origin::User } else { Origin::Assistant };
            prop_assert_eq!(*origin, expected);
        }
        // An odd count means a turn is still outstanding
        prop_assert_eq!(origins.len() % 2 == 1, state.is_awaiting());
    }

    /// The typing flag is never asserted once a turn has settled
    #[test]
    fn prop_chat_idle_is_never_typing(events in prop::collection::vec(arb_chat_event(), 1..40)) {
        let mut state = ChatState::Idle;
        for event in events {
            if let Ok(result) = chat::transition(&state, event) {
                state = result.new_state;
            }
            if state == ChatState::Idle {
                prop_assert!(!state.is_typing());
            }
        }
    }

    /// Blank submissions are always ignored
    #[test]
    fn prop_blank_submit_ignored(text in "[ \t\n]{0,8}") {
        let rejected = chat::transition(&ChatState::Idle, ChatEvent::Submit { text }).is_err();
        prop_assert!(rejected);
    }

    /// At most one request per accepted submission
    #[test]
    fn prop_one_request_per_turn(events in prop::collection::vec(arb_chat_event(), 1..60)) {
        let mut state = ChatState::Idle;
        let mut submissions = 0usize;
        let mut requests = 0usize;
        for event in events {
            let is_submit = matches!(event, ChatEvent::Submit { .. });
            if let Ok(result) = chat::transition(&state, event) {
                if is_submit {
                    submissions += 1;
                }
                requests += result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, ChatEffect::RequestResponse { .. }))
                    .count();
                state = result.new_state;
            }
        }
        prop_assert!(requests <= submissions);
    }
}

// ============================================================================
// Voice Properties
// ============================================================================

fn voice_rank(state: &VoiceState) -> usize {
    match state {
        VoiceState::Idle => 0,
        VoiceState::Listening { .. } => 1,
        VoiceState::Thinking => 2,
        VoiceState::Speaking => 3,
    }
}

proptest! {
    /// Every accepted transition moves one step along the cycle, or back to idle
    #[test]
    fn prop_voice_is_linear(events in prop::collection::vec(arb_voice_event(), 1..60)) {
        let mut state = VoiceState::Idle;
        for event in events {
            if let Ok(result) = voice::transition(&state, event) {
                let from = voice_rank(&state);
                let to = voice_rank(&result.new_state);
                prop_assert!(to == from || to == (from + 1) % 4 || to == 0);
                state = result.new_state;
            }
        }
    }

    /// A capture is only submitted when leaving Listening, and only one per capture
    #[test]
    fn prop_voice_single_submit_per_capture(events in prop::collection::vec(arb_voice_event(), 1..60)) {
        let mut state = VoiceState::Idle;
        let mut captures = 0usize;
        let mut submits = 0usize;
        for event in events {
            if let Ok(result) = voice::transition(&state, event) {
                if matches!(result.new_state, VoiceState::Listening { .. })
                    && !matches!(state, VoiceState::Listening { .. })
                {
                    captures += 1;
                }
                let submitted = result.effects.contains(&VoiceEffect::SubmitCapture);
                if submitted {
                    let was_listening = matches!(state, VoiceState::Listening { .. });
                    prop_assert!(was_listening);
                    submits += 1;
                }
                state = result.new_state;
            }
        }
        prop_assert!(submits <= captures);
    }

    /// Assistant replies are only appended while entering Speaking
    #[test]
    fn prop_voice_reply_only_on_speaking(events in prop::collection::vec(arb_voice_event(), 1..60)) {
        let mut state = VoiceState::Idle;
        for event in events {
            if let Ok(result) = voice::transition(&state, event) {
                let appends_reply = result.effects.iter().any(|e| matches!(
                    e,
                    VoiceEffect::AppendMessage { origin: Origin::Assistant, .. }
                ));
                if appends_reply {
                    prop_assert_eq!(&state, &VoiceState::Thinking);
                    prop_assert_eq!(&result.new_state, &VoiceState::Speaking);
                }
                state = result.new_state;
            }
        }
    }
}
