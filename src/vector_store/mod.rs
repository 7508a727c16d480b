pub mod memory;
pub mod qdrant;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::point::{CollectionInfo, ScoredPoint, StoredPoint};

/// Similarity metric for a collection's vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
        }
    }
}

/// Abstract vector store interface.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates a collection configured for `dimension`-sized vectors. Fails
    /// if the collection already exists.
    async fn create_collection(
        &self,
        name: &str,
        dimension: u32,
        distance: Distance,
    ) -> Result<(), StoreError>;

    /// Returns the collection's metadata, or `None` if it does not exist.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError>;

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Writes points, replacing any with the same id. Returns only once the
    /// write is durable, so a subsequent search sees every point.
    async fn upsert(&self, name: &str, points: &[StoredPoint]) -> Result<(), StoreError>;

    /// Nearest-neighbour search, best score first. `score_threshold`, when
    /// set, drops hits scoring below it server-side.
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, StoreError>;

    /// All collection names in the store.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}
