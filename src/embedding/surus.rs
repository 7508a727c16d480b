use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{DimensionMode, EmbeddingProvider};
use crate::error::ProviderError;

/// Configurable-dimension embedding provider. The backing model serves a
/// matryoshka representation: any requested dimension comes back as a
/// truncation of the native vector, trading retrieval fidelity for storage.
pub struct SurusEmbeddingProvider {
    model_name: String,
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: u32,
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

impl SurusEmbeddingProvider {
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
impl EmbeddingProvider for SurusEmbeddingProvider {
    async fn embed(
        &self,
        texts: &[String],
        dimension: u32,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model_name,
            input: texts,
            dimensions: dimension,
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
        if parsed.data.len() != texts.len() {
            return Err(ProviderError::Contract(format!(
                "{} embeddings returned for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index.unwrap_or(0));
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn name(&self) -> &str {
        "surus"
    }

    fn dimension_mode(&self) -> DimensionMode {
        DimensionMode::Configurable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_dimensions() {
        let input = vec!["Hola mundo".to_string()];
        let req = EmbeddingRequest {
            model: "nomic-ai/nomic-embed-text-v2-moe",
            input: &input,
            dimensions: 256,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["dimensions"], 256);
        assert_eq!(json["input"][0], "Hola mundo");
    }

    #[test]
    fn test_configurable_dimension_follows_request() {
        let provider =
            SurusEmbeddingProvider::new("nomic-ai/nomic-embed-text-v2-moe", "k", "https://api.surus.dev/v1");
        assert_eq!(provider.effective_dimension(256), 256);
        assert_eq!(provider.name(), "surus");
        assert_eq!(provider.dimension_mode(), DimensionMode::Configurable);
    }
}
