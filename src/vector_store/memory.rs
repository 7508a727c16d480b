//! In-memory vector store with brute-force cosine search. Used in tests and
//! as a fallback when no external store is reachable.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Distance, VectorStore};
use crate::error::StoreError;
use crate::models::point::{CollectionInfo, ScoredPoint, StoredPoint};

struct MemoryCollection {
    dimension: u32,
    points: HashMap<u64, StoredPoint>,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(
        &self,
        name: &str,
        dimension: u32,
        _distance: Distance,
    ) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .expect("collection map lock poisoned");
        if collections.contains_key(name) {
            return Err(StoreError::Api {
                status: 409,
                body: format!("collection {name} already exists"),
            });
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let collections = self
            .collections
            .read()
            .expect("collection map lock poisoned");
        Ok(collections.get(name).map(|c| CollectionInfo {
            dimension: c.dimension,
            point_count: Some(c.points.len() as u64),
        }))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .expect("collection map lock poisoned");
        if collections.remove(name).is_none() {
            return Err(StoreError::Api {
                status: 404,
                body: format!("collection {name} not found"),
            });
        }
        Ok(())
    }

    async fn upsert(&self, name: &str, points: &[StoredPoint]) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .expect("collection map lock poisoned");
        let collection = collections.get_mut(name).ok_or_else(|| StoreError::Api {
            status: 404,
            body: format!("collection {name} not found"),
        })?;
        for point in points {
            if point.vector.len() as u32 != collection.dimension {
                return Err(StoreError::Api {
                    status: 400,
                    body: format!(
                        "vector of size {} for collection of size {}",
                        point.vector.len(),
                        collection.dimension
                    ),
                });
            }
        }
        for point in points {
            collection.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let collections = self
            .collections
            .read()
            .expect("collection map lock poisoned");
        let collection = collections.get(name).ok_or_else(|| StoreError::Api {
            status: 404,
            body: format!("collection {name} not found"),
        })?;

        let mut scored: Vec<ScoredPoint> = collection
            .points
            .values()
            .map(|p| ScoredPoint {
                id: p.id,
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        // Ties rank by id so results are reproducible across runs.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(threshold) = score_threshold {
            scored.retain(|p| p.score >= threshold);
        }
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let collections = self
            .collections
            .read()
            .expect("collection map lock poisoned");
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
