//! Environment configuration

use crate::runtime::LivenessDelay;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TYPING_MIN_MS: u64 = 1000;
const DEFAULT_TYPING_MAX_MS: u64 = 2000;
const DEFAULT_VOICE_PROCESSING_MS: u64 = 2000;
const DEFAULT_PLAYBACK_MS: u64 = 3000;

/// Where captured speech is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceBackend {
    /// Fixed reply after `voice_processing`
    Simulated,
    /// The backend's voice socket at `api_url`
    WebSocket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionConfig {
    /// Base URL of the chat responder
    pub api_url: String,
    pub liveness: LivenessDelay,
    pub voice_backend: VoiceBackend,
    pub voice_processing: Duration,
    pub playback: Duration,
    /// None waits for the responder indefinitely
    pub request_timeout: Option<Duration>,
    /// None keeps the session id in memory only
    pub session_file: Option<PathBuf>,
    pub microphone_disabled: bool,
}

impl CompanionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        let session_file = match lookup("LILY_SESSION_FILE") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                Some(PathBuf::from(format!("{home}/.lily/session_id")))
            }
        };

        Self {
            api_url: lookup("LILY_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            liveness: LivenessDelay::new(
                Duration::from_millis(millis("LILY_TYPING_MIN_MS", DEFAULT_TYPING_MIN_MS)),
                Duration::from_millis(millis("LILY_TYPING_MAX_MS", DEFAULT_TYPING_MAX_MS)),
            ),
            voice_backend: match lookup("LILY_VOICE_BACKEND").as_deref().map(str::trim) {
                Some("websocket" | "ws") => VoiceBackend::WebSocket,
                _ => VoiceBackend::Simulated,
            },
            voice_processing: Duration::from_millis(millis(
                "LILY_VOICE_PROCESSING_MS",
                DEFAULT_VOICE_PROCESSING_MS,
            )),
            playback: Duration::from_millis(millis("LILY_PLAYBACK_MS", DEFAULT_PLAYBACK_MS)),
            request_timeout: lookup("LILY_REQUEST_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            session_file,
            microphone_disabled: lookup("LILY_MIC_DISABLED")
                .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
        }
    }
}
