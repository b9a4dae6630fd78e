//! Lily - conversational companion
//!
//! A terminal companion with typed chat and spoken voice modes, backed by a
//! remote chat responder and either the backend's voice socket or a
//! simulated speech backend.

mod capture;
mod config;
mod console;
mod message;
mod responder;
mod runtime;
mod session;
mod state_machine;

use capture::{DeniedMicrophone, SyntheticMicrophone};
use config::{CompanionConfig, VoiceBackend};
use console::{ChatFactory, Console, VoiceFactory};
use responder::{
    HttpResponder, LoggingResponder, SimulatedPlayback, SimulatedVoiceResponder,
    WebSocketVoiceResponder,
};
use runtime::{AudioInput, ChatRuntime, VoiceResponder, VoiceRuntime};
use session::{process_session, FileIdentityStore, IdentityStore, MemoryIdentityStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lily_companion=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = CompanionConfig::from_env();
    tracing::info!(
        api_url = %config.api_url,
        session_file = ?config.session_file,
        microphone_disabled = config.microphone_disabled,
        voice_backend = ?config.voice_backend,
        "Configuration loaded"
    );

    let store: Box<dyn IdentityStore> = match &config.session_file {
        Some(path) => Box::new(FileIdentityStore::new(path.clone())),
        None => Box::new(MemoryIdentityStore::default()),
    };
    let session = process_session(store.as_ref()).clone();

    let http = HttpResponder::new(&config.api_url, config.request_timeout)?;
    if !http.health().await {
        tracing::warn!(
            api_url = %config.api_url,
            "Chat responder is not healthy, replies will fall back"
        );
    }
    let chat_responder = Arc::new(LoggingResponder::new(Arc::new(http)));

    let liveness = config.liveness;
    let spawn_chat: ChatFactory = Box::new(move |session| {
        ChatRuntime::spawn(session, Arc::clone(&chat_responder), liveness)
    });

    let microphone: Arc<dyn AudioInput> = if config.microphone_disabled {
        Arc::new(DeniedMicrophone)
    } else {
        Arc::new(SyntheticMicrophone)
    };
    let voice_responder: Arc<dyn VoiceResponder> = match config.voice_backend {
        VoiceBackend::Simulated => Arc::new(SimulatedVoiceResponder::new(config.voice_processing)),
        VoiceBackend::WebSocket => Arc::new(WebSocketVoiceResponder::new(
            &config.api_url,
            config.request_timeout,
        )?),
    };
    let playback = config.playback;
    let spawn_voice: VoiceFactory = Box::new(move |session| {
        VoiceRuntime::spawn(
            session,
            Arc::clone(&microphone),
            Arc::clone(&voice_responder),
            SimulatedPlayback::new(playback),
        )
    });

    Console::new(session, spawn_chat, spawn_voice).run().await?;

    tracing::info!("Goodbye");
    Ok(())
}
