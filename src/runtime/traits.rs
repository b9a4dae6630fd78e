//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtimes with mock implementations.

use crate::capture::{CaptureDevice, CaptureError, CapturedAudio};
use crate::responder::{ResponderError, VoiceReply};
use crate::session::SessionId;
use async_trait::async_trait;
use std::sync::Arc;

/// Remote responder for typed chat
#[async_trait]
pub trait ChatResponder: Send + Sync {
    /// One request/response round trip, correlated by session
    async fn respond(&self, session: &SessionId, text: &str) -> Result<String, ResponderError>;
}

/// Backend that turns captured audio into a reply
#[async_trait]
pub trait VoiceResponder: Send + Sync {
    async fn respond(
        &self,
        session: &SessionId,
        audio: CapturedAudio,
    ) -> Result<VoiceReply, ResponderError>;
}

/// Source of capture devices (the microphone)
#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Ask for the device. Denial is terminal for this attempt.
    async fn acquire(&self) -> Result<CaptureDevice, CaptureError>;
}

/// Plays a reply back to the user
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Resolves when playback has finished
    async fn play(&self, reply: &VoiceReply) -> Result<(), String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatResponder + ?Sized> ChatResponder for Arc<T> {
    async fn respond(&self, session: &SessionId, text: &str) -> Result<String, ResponderError> {
        (**self).respond(session, text).await
    }
}

#[async_trait]
impl<T: VoiceResponder + ?Sized> VoiceResponder for Arc<T> {
    async fn respond(
        &self,
        session: &SessionId,
        audio: CapturedAudio,
    ) -> Result<VoiceReply, ResponderError> {
        (**self).respond(session, audio).await
    }
}

#[async_trait]
impl<T: AudioInput + ?Sized> AudioInput for Arc<T> {
    async fn acquire(&self) -> Result<CaptureDevice, CaptureError> {
        (**self).acquire().await
    }
}

#[async_trait]
impl<T: AudioOutput + ?Sized> AudioOutput for Arc<T> {
    async fn play(&self, reply: &VoiceReply) -> Result<(), String> {
        (**self).play(reply).await
    }
}
