use std::sync::Arc;

use crate::client::{CompletionApi, ModelInfo, WireMessage};
use crate::models::{Message, Role};
use crate::services::conversation::{ConversationStore, ConversationUpdate};

/// Orchestration over the store and the completion client: one user
/// turn in, one assistant (or error) message out.
pub struct ChatInterface {
    store: ConversationStore,
    client: Arc<dyn CompletionApi>,
    selected_model: String,
    loading: bool,
}

impl ChatInterface {
    pub fn new(
        store: ConversationStore,
        client: Arc<dyn CompletionApi>,
        default_model: String,
    ) -> Self {
        Self {
            store,
            client,
            selected_model: default_model,
            loading: false,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    /// Advisory flag for presentation (typing indicator, disabling
    /// resubmission). Nothing in the store enforces it.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn set_selected_model(&mut self, model: impl Into<String>) {
        self.selected_model = model.into();
    }

    pub async fn list_models(&self) -> Vec<ModelInfo> {
        self.client.list_models().await
    }

    /// Append `text` as a user message, request a completion with the
    /// full history, and append the outcome. A transport or HTTP
    /// failure becomes a visible assistant message rather than an
    /// error; blank input is silently ignored.
    pub async fn send_message(&mut self, text: &str) -> Option<Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.store.add_message(text, Role::User);
        self.loading = true;

        let (mut history, model) = match self.store.active_conversation() {
            Some(conv) => {
                let history = conv
                    .messages
                    .iter()
                    .map(|m| WireMessage {
                        role: m.role.as_str().to_string(),
                        content: m.content.clone(),
                    })
                    .collect();
                let model = conv
                    .model
                    .clone()
                    .unwrap_or_else(|| self.selected_model.clone());
                (history, model)
            }
            None => (Vec::new(), self.selected_model.clone()),
        };

        // The append above should always be visible in the read; if it
        // is not, send the just-written turn on its own.
        if history.is_empty() {
            history.push(WireMessage {
                role: Role::User.as_str().to_string(),
                content: text.to_string(),
            });
        }

        let reply = match self.client.send_completion(history, &model).await {
            Ok(content) => {
                let reply = self.store.add_message(&content, Role::Assistant);
                self.stamp_model(&model);
                reply
            }
            Err(e) => {
                tracing::error!("Completion request failed: {}", e);
                self.store
                    .add_message(&format!("Error: {}", e), Role::Assistant)
            }
        };

        self.loading = false;
        Some(reply)
    }

    /// Record which model served the conversation once the first
    /// exchange lands, so later sends stick with it.
    fn stamp_model(&mut self, model: &str) {
        let unstamped = self
            .store
            .active_conversation()
            .filter(|c| c.model.is_none())
            .map(|c| c.id.clone());
        if let Some(id) = unstamped {
            self.store.update_conversation(
                &id,
                ConversationUpdate {
                    model: Some(model.to_string()),
                    ..Default::default()
                },
            );
        }
    }
}
