//! Chat controller runtime

use super::traits::ChatResponder;
use super::{ChatUpdate, RuntimeStopped, COMMAND_CHANNEL_CAPACITY, UPDATE_CHANNEL_CAPACITY};
use crate::message::{ConversationLog, Message};
use crate::session::SessionId;
use crate::state_machine::chat::{transition, ChatTransitionError};
use crate::state_machine::{ChatEffect, ChatEvent, ChatState};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

/// Uniform range for the pause before each reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessDelay {
    min: Duration,
    max: Duration,
}

impl LivenessDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn sample(&self) -> Duration {
        let min = u64::try_from(self.min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for LivenessDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(2000))
    }
}

/// Point-in-time view of the chat controller
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub state: ChatState,
    pub messages: Vec<Message>,
}

/// Cheap, clonable front for a running chat controller
#[derive(Clone)]
pub struct ChatHandle {
    command_tx: mpsc::Sender<ChatEvent>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    snapshot_rx: watch::Receiver<ChatSnapshot>,
}

impl ChatHandle {
    /// Submit a turn. Blank text, or text sent while a reply is pending, is ignored.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), RuntimeStopped> {
        self.send(ChatEvent::Submit { text: text.into() }).await
    }

    /// Clear the log. Only honoured while idle.
    pub async fn reset(&self) -> Result<(), RuntimeStopped> {
        self.send(ChatEvent::Reset).await
    }

    async fn send(&self, event: ChatEvent) -> Result<(), RuntimeStopped> {
        self.command_tx.send(event).await.map_err(|_| RuntimeStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub fn state(&self) -> ChatState {
        self.snapshot_rx.borrow().state.clone()
    }

    pub fn is_typing(&self) -> bool {
        self.snapshot_rx.borrow().state.is_typing()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.snapshot_rx.borrow().messages.clone()
    }
}

pub struct ChatRuntime<R: ChatResponder + 'static> {
    session: SessionId,
    state: ChatState,
    log: ConversationLog,
    responder: Arc<R>,
    liveness: LivenessDelay,
    command_rx: mpsc::Receiver<ChatEvent>,
    internal_rx: mpsc::Receiver<ChatEvent>,
    internal_tx: mpsc::Sender<ChatEvent>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    snapshot_tx: watch::Sender<ChatSnapshot>,
}

impl<R: ChatResponder + 'static> ChatRuntime<R> {
    /// Start the runtime task. It stops once every handle has been dropped.
    pub fn spawn(session: SessionId, responder: R, liveness: LivenessDelay) -> ChatHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot::default());

        let runtime = Self {
            session,
            state: ChatState::Idle,
            log: ConversationLog::new(),
            responder: Arc::new(responder),
            liveness,
            command_rx,
            internal_rx,
            internal_tx,
            broadcast_tx: broadcast_tx.clone(),
            snapshot_tx,
        };
        tokio::spawn(runtime.run());

        ChatHandle {
            command_tx,
            broadcast_tx,
            snapshot_rx,
        }
    }

    async fn run(mut self) {
        tracing::info!(session_id = %self.session, "Starting chat runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(event) => self.process_event(event),
                    None => break,
                },
                Some(event) = self.internal_rx.recv() => self.process_event(event),
            }
        }

        tracing::info!(session_id = %self.session, "Chat runtime stopped");
    }

    fn process_event(&mut self, event: ChatEvent) {
        let result = match transition(&self.state, event) {
            Ok(r) => r,
            Err(e) => {
                match &e {
                    ChatTransitionError::EmptyInput | ChatTransitionError::Busy => {
                        tracing::debug!(
                            state = self.state.name(),
                            reason = %e,
                            "Chat input ignored"
                        );
                    }
                    ChatTransitionError::InvalidTransition(_) => {
                        tracing::warn!(error = %e, "Unexpected chat event");
                    }
                }
                let _ = self.broadcast_tx.send(ChatUpdate::Rejected {
                    reason: e.to_string(),
                });
                return;
            }
        };

        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: ChatEffect) {
        match effect {
            ChatEffect::AppendMessage {
                origin,
                content,
                delivery,
            } => {
                let message = Message::new(origin, content, delivery);
                self.log.append(message.clone());
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(ChatUpdate::Message { message });
            }

            ChatEffect::ScheduleTyping => {
                let delay = self.liveness.sample();
                let event_tx = self.internal_tx.clone();
                tracing::debug!(delay_ms = %delay.as_millis(), "Typing");
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(ChatEvent::TypingElapsed).await;
                });
            }

            ChatEffect::RequestResponse { text } => {
                let responder = Arc::clone(&self.responder);
                let session = self.session.clone();
                let event_tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let event = match responder.respond(&session, &text).await {
                        Ok(reply) => ChatEvent::ResponseReceived { text: reply },
                        Err(e) => {
                            tracing::warn!(
                                session_id = %session,
                                kind = e.kind.label(),
                                error = %e,
                                "Chat request failed, using fallback reply"
                            );
                            ChatEvent::ResponseFailed { message: e.message }
                        }
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            ChatEffect::ClearLog => {
                self.log.clear();
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(ChatUpdate::Cleared);
            }

            ChatEffect::NotifyState => {
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(ChatUpdate::StateChange {
                    state: self.state.clone(),
                    typing: self.state.is_typing(),
                });
            }

            ChatEffect::NotifySettled => {
                let _ = self.broadcast_tx.send(ChatUpdate::Settled);
            }
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(ChatSnapshot {
            state: self.state.clone(),
            messages: self.log.messages().to_vec(),
        });
    }
}
