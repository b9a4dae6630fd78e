//! Remote responder integrations
//!
//! The chat responder is a plain request/response endpoint. The voice
//! responder either talks to the backend's voice socket or is simulated on
//! timers; both sit behind the traits in `runtime::traits`.

mod error;
mod http;
mod simulated;
mod websocket;

pub use error::{ResponderError, ResponderErrorKind};
pub use http::HttpResponder;
pub use simulated::{SimulatedPlayback, SimulatedVoiceResponder};
pub use websocket::WebSocketVoiceResponder;

use crate::runtime::ChatResponder;
use crate::session::SessionId;
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;

/// Synthesized speech returned alongside a voice reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// What the voice backend hands back for one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceReply {
    pub text: String,
    pub audio: Option<SynthesizedAudio>,
}

/// Append path segments to a backend base URL. Each segment is
/// percent-encoded, so a session id can never change the route.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ResponderError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ResponderError::malformed(format!("Backend URL has no path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Logging wrapper for chat responders
pub struct LoggingResponder {
    inner: Arc<dyn ChatResponder>,
}

impl LoggingResponder {
    pub fn new(inner: Arc<dyn ChatResponder>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ChatResponder for LoggingResponder {
    async fn respond(&self, session: &SessionId, text: &str) -> Result<String, ResponderError> {
        let start = std::time::Instant::now();
        let result = self.inner.respond(session, text).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    session_id = %session,
                    duration_ms = %duration.as_millis(),
                    reply_chars = reply.chars().count(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.label(),
                    error = %e.message,
                    "Chat request failed"
                );
            }
        }

        result
    }
}
