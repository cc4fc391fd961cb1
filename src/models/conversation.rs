use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;

pub const DEFAULT_TITLE: &str = "New Chat";

/// A titled, timestamped sequence of messages. Messages are append-only;
/// `timestamp` tracks the last mutation of any kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub timestamp: DateTime<Utc>,
    pub model: Option<String>,
}

impl Conversation {
    pub fn new(title: Option<String>, model: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            messages: Vec::new(),
            timestamp: Utc::now(),
            model,
        }
    }

    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}
