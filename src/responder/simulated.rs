//! Stand-ins for the transcription/synthesis backend
//!
//! Both run on timers so the voice pipeline keeps its real shape: audio goes
//! in, a reply comes back after a pause, playback takes time.

use super::{ResponderError, VoiceReply};
use crate::capture::CapturedAudio;
use crate::runtime::{AudioOutput, VoiceResponder};
use crate::session::SessionId;
use async_trait::async_trait;
use std::time::Duration;

pub const SIMULATED_VOICE_REPLY: &str = "I heard you! This is where real voice responses will appear once we connect Azure Speech Services.";

/// Answers every capture with a fixed reply after a fixed processing delay
pub struct SimulatedVoiceResponder {
    processing_delay: Duration,
    reply: String,
}

impl SimulatedVoiceResponder {
    pub fn new(processing_delay: Duration) -> Self {
        Self {
            processing_delay,
            reply: SIMULATED_VOICE_REPLY.to_string(),
        }
    }

    #[allow(dead_code)] // Handy for demos with a custom script
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }
}

#[async_trait]
impl VoiceResponder for SimulatedVoiceResponder {
    async fn respond(
        &self,
        session: &SessionId,
        audio: CapturedAudio,
    ) -> Result<VoiceReply, ResponderError> {
        tracing::debug!(
            session_id = %session,
            capture_id = %audio.capture_id,
            chunks = audio.chunks.len(),
            bytes = audio.byte_len(),
            "Simulating voice processing"
        );
        tokio::time::sleep(self.processing_delay).await;
        Ok(VoiceReply {
            text: self.reply.clone(),
            audio: None,
        })
    }
}

/// Pretends to play a reply for a fixed duration
pub struct SimulatedPlayback {
    duration: Duration,
}

impl SimulatedPlayback {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl AudioOutput for SimulatedPlayback {
    async fn play(&self, reply: &VoiceReply) -> Result<(), String> {
        tracing::debug!(
            mime_type = reply.audio.as_ref().map(|a| a.mime_type.as_str()),
            audio_bytes = reply.audio.as_ref().map_or(0, |a| a.bytes.len()),
            duration_ms = %self.duration.as_millis(),
            "Simulating playback"
        );
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}
