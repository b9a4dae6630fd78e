//! Voice controller runtime
//!
//! Owns the capture session while listening. Microphone acquisition is
//! resolved inline before the next command is read, so a second start
//! arriving during the permission prompt sees a non-idle state or a
//! settled denial, never a second device.

use super::traits::{AudioInput, AudioOutput, VoiceResponder};
use super::{RuntimeStopped, VoiceUpdate, COMMAND_CHANNEL_CAPACITY, UPDATE_CHANNEL_CAPACITY};
use crate::capture::{AudioChunk, CaptureSession};
use crate::message::{ConversationLog, Message};
use crate::session::SessionId;
use crate::state_machine::voice::{transition, VoiceTransitionError};
use crate::state_machine::{VoiceEffect, VoiceEvent, VoiceNotice, VoiceState};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Point-in-time view of the voice controller
#[derive(Debug, Clone, Default)]
pub struct VoiceSnapshot {
    pub state: VoiceState,
    pub notice: Option<VoiceNotice>,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct VoiceHandle {
    command_tx: mpsc::Sender<VoiceEvent>,
    broadcast_tx: broadcast::Sender<VoiceUpdate>,
    snapshot_rx: watch::Receiver<VoiceSnapshot>,
}

impl VoiceHandle {
    /// Begin listening. Ignored unless idle.
    pub async fn start(&self) -> Result<(), RuntimeStopped> {
        self.send(VoiceEvent::StartRequested).await
    }

    /// Stop listening and submit the capture. Ignored unless listening.
    pub async fn stop(&self) -> Result<(), RuntimeStopped> {
        self.send(VoiceEvent::StopRequested).await
    }

    pub async fn reset(&self) -> Result<(), RuntimeStopped> {
        self.send(VoiceEvent::Reset).await
    }

    async fn send(&self, event: VoiceEvent) -> Result<(), RuntimeStopped> {
        self.command_tx.send(event).await.map_err(|_| RuntimeStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub fn state(&self) -> VoiceState {
        self.snapshot_rx.borrow().state.clone()
    }

    pub fn notice(&self) -> Option<VoiceNotice> {
        self.snapshot_rx.borrow().notice
    }

    pub fn messages(&self) -> Vec<Message> {
        self.snapshot_rx.borrow().messages.clone()
    }
}

pub struct VoiceRuntime<I, V, O>
where
    I: AudioInput + 'static,
    V: VoiceResponder + 'static,
    O: AudioOutput + 'static,
{
    session: SessionId,
    state: VoiceState,
    notice: Option<VoiceNotice>,
    log: ConversationLog,
    capture: Option<CaptureSession>,
    input: I,
    responder: Arc<V>,
    output: Arc<O>,
    command_rx: mpsc::Receiver<VoiceEvent>,
    internal_rx: mpsc::Receiver<VoiceEvent>,
    internal_tx: mpsc::Sender<VoiceEvent>,
    broadcast_tx: broadcast::Sender<VoiceUpdate>,
    snapshot_tx: watch::Sender<VoiceSnapshot>,
}

impl<I, V, O> VoiceRuntime<I, V, O>
where
    I: AudioInput + 'static,
    V: VoiceResponder + 'static,
    O: AudioOutput + 'static,
{
    /// Start the runtime task. Dropping every handle stops it and releases
    /// any device still held.
    pub fn spawn(session: SessionId, input: I, responder: V, output: O) -> VoiceHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(VoiceSnapshot::default());

        let runtime = Self {
            session,
            state: VoiceState::Idle,
            notice: None,
            log: ConversationLog::new(),
            capture: None,
            input,
            responder: Arc::new(responder),
            output: Arc::new(output),
            command_rx,
            internal_rx,
            internal_tx,
            broadcast_tx: broadcast_tx.clone(),
            snapshot_tx,
        };
        tokio::spawn(runtime.run());

        VoiceHandle {
            command_tx,
            broadcast_tx,
            snapshot_rx,
        }
    }

    async fn run(mut self) {
        tracing::info!(session_id = %self.session, "Starting voice runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(event) => self.process_event(event).await,
                    None => break,
                },
                Some(event) = self.internal_rx.recv() => self.process_event(event).await,
                chunk = next_chunk(&mut self.capture) => match (chunk, self.capture.as_mut()) {
                    (Some(chunk), Some(capture)) => capture.push(chunk),
                    (None, Some(capture)) => capture.close_stream(),
                    _ => {}
                },
            }
        }

        if let Some(capture) = self.capture.take() {
            tracing::info!(session_id = %self.session, "Voice runtime stopping mid-capture");
            drop(capture);
        }
        tracing::info!(session_id = %self.session, "Voice runtime stopped");
    }

    async fn process_event(&mut self, event: VoiceEvent) {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.state, current_event) {
                Ok(r) => r,
                Err(e) => {
                    match &e {
                        VoiceTransitionError::InvalidTransition(_) => {
                            tracing::warn!(error = %e, "Unexpected voice event");
                        }
                        _ => {
                            tracing::debug!(
                                state = self.state.name(),
                                reason = %e,
                                "Voice input ignored"
                            );
                        }
                    }
                    let _ = self.broadcast_tx.send(VoiceUpdate::Rejected {
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            self.state = result.new_state;
            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    async fn execute_effect(&mut self, effect: VoiceEffect) -> Option<VoiceEvent> {
        match effect {
            VoiceEffect::AcquireMicrophone => match self.input.acquire().await {
                Ok(device) => {
                    let capture = CaptureSession::open(device);
                    let capture_id = capture.id().to_string();
                    self.capture = Some(capture);
                    Some(VoiceEvent::MicrophoneGranted { capture_id })
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session,
                        error = %e,
                        "Microphone unavailable"
                    );
                    Some(VoiceEvent::MicrophoneDenied {
                        reason: e.to_string(),
                    })
                }
            },

            VoiceEffect::SubmitCapture => {
                let Some(capture) = self.capture.take() else {
                    tracing::error!("Submit requested with no capture session");
                    return Some(VoiceEvent::ProcessingFailed {
                        message: "no capture session".to_string(),
                    });
                };
                let audio = capture.finish();

                let responder = Arc::clone(&self.responder);
                let session = self.session.clone();
                let event_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let event = match responder.respond(&session, audio).await {
                        Ok(reply) => VoiceEvent::ReplyReady { reply },
                        Err(e) => {
                            tracing::warn!(
                                session_id = %session,
                                kind = e.kind.label(),
                                error = %e,
                                "Voice processing failed"
                            );
                            VoiceEvent::ProcessingFailed { message: e.message }
                        }
                    };
                    let _ = event_tx.send(event).await;
                });
                None
            }

            VoiceEffect::AppendMessage { origin, content } => {
                let message = Message::new(origin, content, None);
                self.log.append(message.clone());
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(VoiceUpdate::Message { message });
                None
            }

            VoiceEffect::PlayReply { reply } => {
                let output = Arc::clone(&self.output);
                let event_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = output.play(&reply).await {
                        tracing::warn!(error = %e, "Playback failed");
                    }
                    let _ = event_tx.send(VoiceEvent::PlaybackFinished).await;
                });
                None
            }

            VoiceEffect::SetNotice(notice) => {
                self.notice = notice;
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(VoiceUpdate::Notice { notice });
                None
            }

            VoiceEffect::ClearLog => {
                self.log.clear();
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(VoiceUpdate::Cleared);
                None
            }

            VoiceEffect::NotifyState => {
                tracing::debug!(state = self.state.name(), "Voice state changed");
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(VoiceUpdate::StateChange {
                    state: self.state.clone(),
                });
                None
            }
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(VoiceSnapshot {
            state: self.state.clone(),
            notice: self.notice,
            messages: self.log.messages().to_vec(),
        });
    }
}

/// Next chunk of the active capture; pends while there is none
async fn next_chunk(capture: &mut Option<CaptureSession>) -> Option<AudioChunk> {
    match capture {
        Some(session) => session.recv().await,
        None => std::future::pending().await,
    }
}
