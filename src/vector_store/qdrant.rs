//! Vector store backed by the Qdrant REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{Distance, VectorStore};
use crate::error::StoreError;
use crate::models::point::{CollectionInfo, PointPayload, ScoredPoint, StoredPoint};

pub struct QdrantStore {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CollectionDescribeResponse {
    result: CollectionDescribe,
}

#[derive(Deserialize)]
struct CollectionDescribe {
    #[serde(default)]
    points_count: Option<u64>,
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: u32,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: Vec<PointRecord<'a>>,
}

#[derive(Serialize)]
struct PointRecord<'a> {
    id: u64,
    vector: &'a [f32],
    payload: &'a PointPayload,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: u64,
    score: f32,
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Deserialize)]
struct ListCollectionsResponse {
    result: CollectionList,
}

#[derive(Deserialize)]
struct CollectionList {
    collections: Vec<CollectionEntry>,
}

#[derive(Deserialize)]
struct CollectionEntry {
    name: String,
}

impl QdrantStore {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Result<Self, StoreError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| StoreError::Malformed(format!("invalid api key header: {e}")))?;
            headers.insert("api-key", value);
        }
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{name}", self.base_url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api { status, body })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(
        &self,
        name: &str,
        dimension: u32,
        distance: Distance,
    ) -> Result<(), StoreError> {
        let body = json!({
            "vectors": { "size": dimension, "distance": distance.as_str() }
        });
        let resp = self
            .http_client
            .put(self.collection_url(name))
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let resp = self
            .http_client
            .get(self.collection_url(name))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp).await?;
        let parsed: CollectionDescribeResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("collection describe: {e}")))?;
        Ok(Some(CollectionInfo {
            dimension: parsed.result.config.params.vectors.size,
            point_count: parsed.result.points_count,
        }))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let resp = self
            .http_client
            .delete(self.collection_url(name))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn upsert(&self, name: &str, points: &[StoredPoint]) -> Result<(), StoreError> {
        let request = UpsertRequest {
            points: points
                .iter()
                .map(|p| PointRecord {
                    id: p.id,
                    vector: &p.vector,
                    payload: &p.payload,
                })
                .collect(),
        };
        // wait=true blocks until the write is applied, so points are
        // immediately searchable.
        let resp = self
            .http_client
            .put(format!("{}/points?wait=true", self.collection_url(name)))
            .json(&request)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(threshold) = score_threshold {
            body["score_threshold"] = json!(threshold);
        }
        let resp = self
            .http_client
            .post(format!("{}/points/search", self.collection_url(name)))
            .json(&body)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("search response: {e}")))?;

        let mut points = Vec::with_capacity(parsed.result.len());
        for hit in parsed.result {
            match hit.payload {
                Some(payload) => points.push(ScoredPoint {
                    id: hit.id,
                    score: hit.score,
                    payload,
                }),
                None => warn!(collection = name, id = hit.id, "search hit without payload, skipping"),
            }
        }
        Ok(points)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let resp = self
            .http_client
            .get(format!("{}/collections", self.base_url))
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let parsed: ListCollectionsResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("collection list: {e}")))?;
        Ok(parsed
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }
}
