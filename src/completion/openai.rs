use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::CompletionModel;
use crate::error::ProviderError;
use crate::prompt::ConversationMessage;

/// Chat completion client for OpenAI-compatible endpoints.
pub struct OpenAiCompletionModel {
    model_name: String,
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompletionModel {
    pub fn new(model_name: &str, api_key: &str, base_url: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletionModel {
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            model: &self.model_name,
            messages,
            max_tokens,
        };
        let resp = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: CompletionResponse = resp.json().await.map_err(|e| {
            ProviderError::Contract(format!("unexpected completion response shape: {e}"))
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Contract("completion had no choices".to_string()))
    }
}
