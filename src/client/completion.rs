use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::models::{
    ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse, ModelList, WireMessage,
};
use super::types::{ClientError, CompletionApi, ModelInfo};

/// Reply text used when the response parses but carries no message
/// content in the first choice.
pub const FALLBACK_REPLY: &str = "I couldn't generate a response. Please try again.";

/// HTTP implementation of [`CompletionApi`] against an OpenAI-compatible
/// endpoint.
pub struct CompletionClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl CompletionClient {
    pub fn new(base_url: Url, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> Option<String> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.api_key))
        }
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error.message);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let url = self.endpoint("models");

        let mut req = self.client.get(&url);
        if let Some(auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let model_list: ModelList = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let models = model_list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name.unwrap_or_else(|| m.id.clone()),
                id: m.id,
                description: m.description,
            })
            .collect();

        Ok(models)
    }
}

#[async_trait]
impl CompletionApi for CompletionClient {
    async fn send_completion(
        &self,
        messages: Vec<WireMessage>,
        model: &str,
    ) -> Result<String, ClientError> {
        let url = self.endpoint("chat/completions");

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
        };

        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request);

        if let Some(auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ClientError::AuthError("Invalid API key".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());

        Ok(content)
    }

    async fn list_models(&self) -> Vec<ModelInfo> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!("Failed to fetch model list: {}", e);
                Vec::new()
            }
        }
    }
}
