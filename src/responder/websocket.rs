//! WebSocket voice responder
//!
//! Wire format of the companion backend: one socket per capture on
//! `{base}/ws/voice/{session_id}`. The client sends `start_listening`, then a
//! single `audio_data` frame carrying the capture as a base64 data URL, and
//! waits for the `ai_response` frame. `status` frames are informational.

use super::{endpoint, ResponderError, VoiceReply};
use crate::capture::CapturedAudio;
use crate::runtime::VoiceResponder;
use crate::session::SessionId;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite};

/// 16 kHz mono PCM16, as produced by the capture devices
const CAPTURE_MIME_TYPE: &str = "audio/pcm";

pub struct WebSocketVoiceResponder {
    base_url: Url,
    timeout: Option<Duration>,
}

impl WebSocketVoiceResponder {
    /// Accepts the HTTP base of the backend (`http` maps to `ws`, `https` to
    /// `wss`) or a socket URL directly. `timeout` bounds the whole exchange.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ResponderError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| ResponderError::malformed(format!("Invalid backend URL: {e}")))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ResponderError::malformed(format!(
                    "Unsupported backend scheme: {other}"
                )))
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            ResponderError::malformed(format!("Cannot use {scheme} for {base_url}"))
        })?;

        Ok(Self {
            base_url: url,
            timeout,
        })
    }

    fn voice_url(&self, session: &SessionId) -> Result<Url, ResponderError> {
        endpoint(&self.base_url, &["ws", "voice", session.as_str()])
    }

    async fn exchange(url: &Url, audio: &CapturedAudio) -> Result<VoiceReply, ResponderError> {
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ResponderError::network(format!("Connection failed: {e}")))?;

        let mut pcm = Vec::with_capacity(audio.byte_len());
        for chunk in &audio.chunks {
            pcm.extend_from_slice(&chunk.data);
        }
        let frames = [
            json!({ "type": "start_listening" }),
            json!({
                "type": "audio_data",
                "capture_id": audio.capture_id,
                "audio_data": format!("data:{CAPTURE_MIME_TYPE};base64,{}", BASE64.encode(&pcm)),
            }),
        ];
        for frame in frames {
            socket
                .send(tungstenite::Message::Text(frame.to_string().into()))
                .await
                .map_err(|e| ResponderError::network(format!("Send failed: {e}")))?;
        }

        while let Some(message) = socket.next().await {
            let message =
                message.map_err(|e| ResponderError::network(format!("Socket error: {e}")))?;
            let text = match message {
                tungstenite::Message::Text(t) => t,
                tungstenite::Message::Close(frame) => {
                    let reason = frame.map(|f| f.reason.as_str().to_string()).unwrap_or_default();
                    return Err(ResponderError::network(format!(
                        "Closed before a reply: {reason}"
                    )));
                }
                _ => continue,
            };

            let frame: ServerFrame = serde_json::from_str(&text).map_err(|e| {
                let text = text.as_str();
                ResponderError::malformed(format!("Failed to parse frame: {e} - frame: {text}"))
            })?;
            match frame {
                ServerFrame::Status { status } => {
                    tracing::debug!(
                        capture_id = %audio.capture_id,
                        status = %status,
                        "Voice backend status"
                    );
                }
                ServerFrame::AiResponse { text } => {
                    if let Err(e) = socket.close(None).await {
                        tracing::debug!(error = %e, "Voice socket close failed");
                    }
                    return Ok(VoiceReply { text, audio: None });
                }
                ServerFrame::Other => {}
            }
        }

        Err(ResponderError::network("Connection ended before a reply"))
    }
}

#[async_trait]
impl VoiceResponder for WebSocketVoiceResponder {
    async fn respond(
        &self,
        session: &SessionId,
        audio: CapturedAudio,
    ) -> Result<VoiceReply, ResponderError> {
        let url = self.voice_url(session)?;
        tracing::debug!(
            session_id = %session,
            capture_id = %audio.capture_id,
            bytes = audio.byte_len(),
            "Sending capture to voice backend"
        );

        let exchange = Self::exchange(&url, &audio);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange).await.map_err(|_| {
                ResponderError::timeout(format!("No reply within {}ms", limit.as_millis()))
            })?,
            None => exchange.await,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Status {
        status: String,
    },
    AiResponse {
        text: String,
    },
    #[serde(other)]
    Other,
}
