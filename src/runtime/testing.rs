//! Mock implementations for testing
//!
//! These mocks enable runtime tests without network, device or audio I/O.

use super::traits::*;
use crate::capture::{AudioChunk, CaptureDevice, CaptureError, CapturedAudio, DeviceRelease};
use crate::responder::{ResponderError, VoiceReply};
use crate::session::SessionId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive updates until one matches, giving up after a few seconds
pub async fn wait_for_update<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    matches: impl Fn(&T) -> bool,
) -> Option<T> {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(update)) if matches(&update) => return Some(update),
            Ok(Ok(_) | Err(broadcast::error::RecvError::Lagged(_))) => {}
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

// ============================================================================
// Mock Chat Responder
// ============================================================================

/// Chat responder that returns queued replies
pub struct MockChatResponder {
    responses: Mutex<VecDeque<Result<String, ResponderError>>>,
    /// Record of all requests made, as (session id, text)
    pub requests: Mutex<Vec<(String, String)>>,
}

impl MockChatResponder {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: ResponderError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, session: &SessionId, text: &str) -> Result<String, ResponderError> {
        self.requests
            .lock()
            .unwrap()
            .push((session.to_string(), text.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ResponderError::network("No mock response queued")))
    }
}

impl Default for MockChatResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatResponder for MockChatResponder {
    async fn respond(&self, session: &SessionId, text: &str) -> Result<String, ResponderError> {
        self.next_response(session, text)
    }
}

/// Chat responder that takes its time (network latency stand-in)
pub struct DelayedMockResponder {
    inner: MockChatResponder,
    delay: Duration,
    /// Notified when a request starts
    pub request_started: Arc<Notify>,
}

impl DelayedMockResponder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockChatResponder::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.inner.queue_reply(reply);
    }
}

#[async_trait]
impl ChatResponder for DelayedMockResponder {
    async fn respond(&self, session: &SessionId, text: &str) -> Result<String, ResponderError> {
        self.request_started.notify_waiters();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response(session, text)
    }
}

// ============================================================================
// Mock Microphone
// ============================================================================

struct CountingRelease {
    releases: Arc<AtomicUsize>,
    fail: bool,
}

impl DeviceRelease for CountingRelease {
    fn release(self: Box<Self>) -> Result<(), CaptureError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(CaptureError::Release("device already stopped".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Microphone that counts acquisitions and releases; chunks are fed by `emit`
pub struct MockMicrophone {
    deny: bool,
    fail_release: bool,
    grant_delay: Duration,
    acquisitions: AtomicUsize,
    releases: Arc<AtomicUsize>,
    chunk_tx: Mutex<Option<mpsc::Sender<AudioChunk>>>,
}

impl MockMicrophone {
    pub fn new() -> Self {
        Self {
            deny: false,
            fail_release: false,
            grant_delay: Duration::ZERO,
            acquisitions: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            chunk_tx: Mutex::new(None),
        }
    }

    /// Every acquisition is refused
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    /// Permission prompt takes a while to answer
    pub fn with_grant_delay(mut self, delay: Duration) -> Self {
        self.grant_delay = delay;
        self
    }

    /// Release reports an error (it is still counted)
    pub fn with_failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Feed a chunk into the most recently granted device
    pub async fn emit(&self, data: Vec<u8>) {
        let tx = self.chunk_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(AudioChunk::new(data)).await;
        }
    }
}

impl Default for MockMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioInput for MockMicrophone {
    async fn acquire(&self) -> Result<CaptureDevice, CaptureError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if !self.grant_delay.is_zero() {
            tokio::time::sleep(self.grant_delay).await;
        }
        if self.deny {
            return Err(CaptureError::PermissionDenied("NotAllowedError".to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        *self.chunk_tx.lock().unwrap() = Some(tx);
        Ok(CaptureDevice::new(
            rx,
            CountingRelease {
                releases: Arc::clone(&self.releases),
                fail: self.fail_release,
            },
        ))
    }
}

// ============================================================================
// Mock Voice Responder and Playback
// ============================================================================

/// Voice responder that returns queued replies and records every capture
pub struct MockVoiceResponder {
    responses: Mutex<VecDeque<Result<VoiceReply, ResponderError>>>,
    delay: Duration,
    sessions: Mutex<Vec<String>>,
    captures: Mutex<Vec<CapturedAudio>>,
}

impl MockVoiceResponder {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            sessions: Mutex::new(Vec::new()),
            captures: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn queue(&self, response: Result<VoiceReply, ResponderError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn queue_reply(&self, text: impl Into<String>) {
        self.queue(Ok(VoiceReply {
            text: text.into(),
            audio: None,
        }));
    }

    pub fn queue_error(&self, error: ResponderError) {
        self.queue(Err(error));
    }

    pub fn recorded_sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn recorded_captures(&self) -> Vec<CapturedAudio> {
        self.captures.lock().unwrap().clone()
    }
}

impl Default for MockVoiceResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceResponder for MockVoiceResponder {
    async fn respond(
        &self,
        session: &SessionId,
        audio: CapturedAudio,
    ) -> Result<VoiceReply, ResponderError> {
        self.sessions.lock().unwrap().push(session.to_string());
        self.captures.lock().unwrap().push(audio);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ResponderError::network("No mock response queued")))
    }
}

/// Playback that finishes immediately
pub struct InstantPlayback;

#[async_trait]
impl AudioOutput for InstantPlayback {
    async fn play(&self, _reply: &VoiceReply) -> Result<(), String> {
        Ok(())
    }
}

/// Playback that finishes immediately and keeps every reply it was handed
#[derive(Default)]
pub struct RecordingPlayback {
    played: Mutex<Vec<VoiceReply>>,
}

impl RecordingPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<VoiceReply> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioOutput for RecordingPlayback {
    async fn play(&self, reply: &VoiceReply) -> Result<(), String> {
        self.played.lock().unwrap().push(reply.clone());
        Ok(())
    }
}
