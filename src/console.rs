//! Line-oriented terminal front-end
//!
//! Only one controller is mounted at a time. Switching modes tears the
//! current one down (releasing the microphone if it was listening) and
//! mounts a fresh one; the session id is the only thing carried across.

use crate::message::{DeliveryState, Message, Origin};
use crate::runtime::{ChatHandle, ChatUpdate, RuntimeStopped, VoiceHandle, VoiceUpdate};
use crate::session::SessionId;
use crate::state_machine::{VoiceNotice, VoiceState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const HELP: &str = "Commands: /chat, /voice, /history, /reset, /quit. In voice mode press Enter to start or stop listening.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chat,
    Voice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    ToggleListening,
    Switch(Mode),
    Reset,
    History,
    Help,
    Quit,
}

/// Interpret one input line in the context of the active mode
pub fn parse_command(line: &str, mode: Mode) -> Command {
    match line.trim() {
        "/quit" | "/exit" => Command::Quit,
        "/chat" => Command::Switch(Mode::Chat),
        "/voice" => Command::Switch(Mode::Voice),
        "/reset" => Command::Reset,
        "/history" => Command::History,
        "/help" => Command::Help,
        "" if mode == Mode::Voice => Command::ToggleListening,
        _ => Command::Say(line.to_string()),
    }
}

pub type ChatFactory = Box<dyn Fn(SessionId) -> ChatHandle + Send>;
pub type VoiceFactory = Box<dyn Fn(SessionId) -> VoiceHandle + Send>;

enum Mounted {
    Chat(ChatHandle),
    Voice(VoiceHandle),
}

pub struct Console {
    session: SessionId,
    spawn_chat: ChatFactory,
    spawn_voice: VoiceFactory,
    mounted: Mounted,
    renderer: JoinHandle<()>,
}

impl Console {
    pub fn new(session: SessionId, spawn_chat: ChatFactory, spawn_voice: VoiceFactory) -> Self {
        let chat = spawn_chat(session.clone());
        let renderer = tokio::spawn(render_chat(chat.subscribe()));
        Self {
            session,
            spawn_chat,
            spawn_voice,
            mounted: Mounted::Chat(chat),
            renderer,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.mounted {
            Mounted::Chat(_) => Mode::Chat,
            Mounted::Voice(_) => Mode::Voice,
        }
    }

    /// Read stdin until `/quit` or end of input
    pub async fn run(mut self) -> Result<(), std::io::Error> {
        println!("Lily is here. Session {}", self.session);
        println!("{HELP}");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let command = parse_command(&line, self.mode());
            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.dispatch(command).await {
                tracing::error!(error = %e, "Controller unavailable");
                break;
            }
        }

        self.renderer.abort();
        Ok(())
    }

    async fn dispatch(&mut self, command: Command) -> Result<(), RuntimeStopped> {
        if let Command::Switch(mode) = command {
            if mode != self.mode() {
                self.mount(mode);
            }
            return Ok(());
        }

        match (command, &self.mounted) {
            (Command::Say(text), Mounted::Chat(chat)) => {
                if chat.is_typing() {
                    println!("(Lily is typing, hold on)");
                } else if chat.state().is_awaiting() {
                    println!("(waiting for Lily's reply)");
                }
                chat.submit(text).await?;
            }
            (Command::Say(_), Mounted::Voice(_)) => {
                println!("(voice mode: press Enter to talk, or /chat to type)");
            }
            (Command::ToggleListening, Mounted::Voice(voice)) => {
                let state = voice.state();
                if !state.control_enabled() {
                    println!("(Lily is still replying)");
                } else if matches!(state, VoiceState::Listening { .. }) {
                    voice.stop().await?;
                } else {
                    voice.start().await?;
                }
            }
            (Command::Reset, Mounted::Chat(chat)) => chat.reset().await?,
            (Command::Reset, Mounted::Voice(voice)) => voice.reset().await?,
            (Command::History, Mounted::Chat(chat)) => print_history(&chat.messages(), None),
            (Command::History, Mounted::Voice(voice)) => {
                print_history(&voice.messages(), voice.notice());
            }
            (Command::Help, _) => println!("{HELP}"),
            _ => {}
        }
        Ok(())
    }

    fn mount(&mut self, mode: Mode) {
        self.renderer.abort();
        let (mounted, renderer) = match mode {
            Mode::Chat => {
                let chat = (self.spawn_chat)(self.session.clone());
                let renderer = tokio::spawn(render_chat(chat.subscribe()));
                (Mounted::Chat(chat), renderer)
            }
            Mode::Voice => {
                let voice = (self.spawn_voice)(self.session.clone());
                let renderer = tokio::spawn(render_voice(voice.subscribe()));
                (Mounted::Voice(voice), renderer)
            }
        };
        // Replacing the handle stops the previous runtime
        self.mounted = mounted;
        self.renderer = renderer;
        tracing::info!(session_id = %self.session, mode = ?mode, "Switched mode");
        let label = match mode {
            Mode::Chat => "chat",
            Mode::Voice => "voice",
        };
        println!("-- {label} mode --");
    }
}

async fn render_chat(mut updates: broadcast::Receiver<ChatUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => {
                if let Some(line) = chat_line(&update) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Chat renderer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn render_voice(mut updates: broadcast::Receiver<VoiceUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => {
                if let Some(line) = voice_line(&update) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Voice renderer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn chat_line(update: &ChatUpdate) -> Option<String> {
    match update {
        ChatUpdate::Message { message } => Some(message_line(message)),
        ChatUpdate::StateChange { state, typing } => {
            tracing::debug!(state = state.name(), typing, "Chat state");
            typing.then(|| "Lily is typing...".to_string())
        }
        ChatUpdate::Cleared => Some("(conversation cleared)".to_string()),
        ChatUpdate::Rejected { reason } => {
            tracing::debug!(reason = %reason, "Chat input ignored");
            None
        }
        ChatUpdate::Settled => None,
    }
}

fn voice_line(update: &VoiceUpdate) -> Option<String> {
    match update {
        VoiceUpdate::Message { message } => Some(message_line(message)),
        VoiceUpdate::Notice { notice } => notice.map(|n| format!("· {}", n.text())),
        VoiceUpdate::Cleared => Some("(transcript cleared)".to_string()),
        VoiceUpdate::StateChange { state } => {
            tracing::debug!(state = state.name(), "Voice state");
            None
        }
        VoiceUpdate::Rejected { reason } => {
            tracing::debug!(reason = %reason, "Voice input ignored");
            None
        }
    }
}

fn print_history(messages: &[Message], notice: Option<VoiceNotice>) {
    if messages.is_empty() {
        println!("(nothing yet)");
    }
    for message in messages {
        println!("{}", message_line(message));
    }
    if let Some(notice) = notice {
        println!("· {}", notice.text());
    }
}

fn message_line(message: &Message) -> String {
    let speaker = match message.origin {
        Origin::User => "You",
        Origin::Assistant => "Lily",
        Origin::SystemError => "!",
    };
    let marker = match message.delivery {
        Some(DeliveryState::Sent) => " ✓",
        Some(DeliveryState::Delivered | DeliveryState::Read) => " ✓✓",
        None => "",
    };
    format!(
        "[{}] {speaker}: {}{marker}",
        message.format_time(),
        message.content
    )
}
