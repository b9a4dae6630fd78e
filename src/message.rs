//! Conversation messages and the append-only log

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_SUFFIX_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    User,
    Assistant,
    SystemError,
}

impl Origin {
    fn id_prefix(self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::Assistant => "ai",
            Origin::SystemError => "error",
        }
    }
}

/// Advisory delivery marker shown next to chat messages. Gates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Read,
}

/// A fully formed message. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub origin: Origin,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryState>,
}

impl Message {
    pub fn new(
        origin: Origin,
        content: impl Into<String>,
        delivery: Option<DeliveryState>,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id: message_id(origin, created_at),
            origin,
            content: content.into(),
            created_at,
            delivery,
        }
    }

    /// Local `HH:MM` rendering of the creation time
    pub fn format_time(&self) -> String {
        format_time(self.created_at)
    }
}

pub fn format_time(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

/// `{prefix}_{unix_millis}_{suffix}`; the suffix keeps ids unique within a millisecond.
fn message_id(origin: Origin, created_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        origin.id_prefix(),
        created_at.timestamp_millis(),
        random_base36(ID_SUFFIX_LEN)
    )
}

pub(crate) fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

/// Ordered, append-only message sequence. Order is append order, not timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Full session reset. Only reachable through an explicit reset request.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
