use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DimensionMode, EmbeddingProvider};
use crate::error::ProviderError;

/// Fixed-dimension embedding provider for OpenAI-compatible endpoints. The
/// requested dimension is ignored; vectors come back at the model's native
/// size.
pub struct OpenAiEmbeddingProvider {
    model_name: String,
    api_key: String,
    base_url: String,
    native_dimension: u32,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl OpenAiEmbeddingProvider {
    pub fn new(model_name: &str, api_key: &str, base_url: &str, native_dimension: u32) -> Self {
        Self {
            model_name: model_name.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            native_dimension,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(
        &self,
        texts: &[String],
        _dimension: u32,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
        };
        let resp = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
            ProviderError::Contract(format!("unexpected embedding response shape: {e}"))
        })?;
        into_vectors(parsed, texts.len())
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn dimension_mode(&self) -> DimensionMode {
        DimensionMode::Fixed {
            native: self.native_dimension,
        }
    }
}

/// Orders entries by their reported index and validates the count.
fn into_vectors(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if response.data.len() != expected {
        return Err(ProviderError::Contract(format!(
            "{} embeddings returned for {} inputs",
            response.data.len(),
            expected
        )));
    }
    let mut data = response.data;
    data.sort_by_key(|d| d.index.unwrap_or(0));
    Ok(data.into_iter().map(|d| d.embedding).collect())
}
