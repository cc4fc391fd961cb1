use async_trait::async_trait;
use thiserror::Error;

use super::models::WireMessage;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// An entry from the remote model list, for the model picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// The narrow contract the orchestration layer depends on. One request
/// per user turn; the model list is best-effort convenience.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Send the full conversation history and return the assistant's
    /// reply text.
    async fn send_completion(
        &self,
        messages: Vec<WireMessage>,
        model: &str,
    ) -> Result<String, ClientError>;

    /// List available models. Failures degrade to an empty list rather
    /// than propagating.
    async fn list_models(&self) -> Vec<ModelInfo>;
}
