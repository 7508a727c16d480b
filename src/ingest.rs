//! Document ingestion: chunk, embed, and persist into the collection for
//! the active (provider, dimension) pair.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::chunker;
use crate::collections::{ensure_collection, CollectionIdentity};
use crate::embedding::gateway::EmbeddingGateway;
use crate::embedding::DimensionMode;
use crate::error::PipelineError;
use crate::models::chunk::DocumentSource;
use crate::models::point::{CostMetrics, PointPayload, StoredPoint};
use crate::vector_store::VectorStore;

/// Allocates point ids that are unique and strictly increasing for the life
/// of the process, even when ingestions overlap or the clock stands still.
///
/// Each reservation claims a block of 1024 ordinal slots above a microsecond
/// timestamp base, so ids stay roughly time-ordered without ever colliding.
#[derive(Default)]
pub struct PointIdGenerator {
    last_base: AtomicU64,
}

const ORDINALS_PER_BASE: u64 = 1024;

impl PointIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves ids for `count` points and returns the base; the id of point
    /// `i` is `base * 1024 + i`.
    pub fn reserve(&self, count: usize) -> u64 {
        let slots = (count.max(1) as u64).div_ceil(ORDINALS_PER_BASE);
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let base = self
            .last_base
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now).wrapping_add(slots))
            })
            .map(|last| last.max(now))
            .unwrap_or(now);
        base
    }
}

pub fn point_id(base: u64, ordinal: usize) -> u64 {
    base * ORDINALS_PER_BASE + ordinal as u64
}

/// Chunk sizing per dimension mode. Configurable-dimension models keep more
/// signal in smaller chunks after truncation, so they get a tighter budget.
#[derive(Debug, Clone)]
pub struct ChunkBudget {
    pub fixed_max_tokens: usize,
    pub configurable_max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkBudget {
    fn default() -> Self {
        Self {
            fixed_max_tokens: 400,
            configurable_max_tokens: 250,
            overlap_tokens: 50,
        }
    }
}

impl ChunkBudget {
    fn max_tokens(&self, mode: DimensionMode) -> usize {
        match mode {
            DimensionMode::Fixed { .. } => self.fixed_max_tokens,
            DimensionMode::Configurable => self.configurable_max_tokens,
        }
    }
}

/// What an ingestion call wrote, reported back to the caller.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub collection: String,
    pub dimension: u32,
    pub chunk_count: usize,
    pub cost: CostMetrics,
}

pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    gateway: Arc<EmbeddingGateway>,
    ids: Arc<PointIdGenerator>,
    budget: ChunkBudget,
    cost_per_mb_month: f64,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        gateway: Arc<EmbeddingGateway>,
        ids: Arc<PointIdGenerator>,
        budget: ChunkBudget,
        cost_per_mb_month: f64,
    ) -> Self {
        Self {
            store,
            gateway,
            ids,
            budget,
            cost_per_mb_month,
        }
    }

    /// Runs the full pipeline for one document. Validation happens before
    /// any store or provider call; a source yielding zero usable chunks is
    /// rejected outright.
    pub async fn ingest(
        &self,
        source: &DocumentSource,
        requested_dimension: u32,
    ) -> Result<IngestOutcome, PipelineError> {
        let provider = self.gateway.provider();
        let dimension = provider.effective_dimension(requested_dimension);
        let max_tokens = self.budget.max_tokens(provider.dimension_mode());

        let chunks = chunker::chunk_source(source, max_tokens, self.budget.overlap_tokens);
        if chunks.is_empty() {
            return Err(PipelineError::Validation(
                "document contains no embeddable text".to_string(),
            ));
        }

        let identity = CollectionIdentity::new(provider.name(), dimension);
        ensure_collection(self.store.as_ref(), &identity).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.gateway.embed_batch(&texts, dimension).await?;

        let timestamp = Utc::now().to_rfc3339();
        let base = self.ids.reserve(chunks.len());
        let points: Vec<StoredPoint> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| StoredPoint {
                id: point_id(base, i),
                vector,
                payload: PointPayload {
                    text: chunk.text.clone(),
                    timestamp: timestamp.clone(),
                    dimension,
                    provider: provider.name().to_string(),
                    source_format: Some(chunk.source_format),
                    source_key: chunk.source_key.clone(),
                    original_index: chunk.original_index,
                    estimated_tokens: chunker::estimate_tokens(&chunk.text),
                },
            })
            .collect();

        let name = identity.name();
        self.store.upsert(&name, &points).await?;

        // Stores that cannot report a count fall back to what was written.
        let total_vectors = self
            .store
            .get_collection(&name)
            .await?
            .and_then(|info| info.point_count)
            .unwrap_or(points.len() as u64);
        let cost = CostMetrics::compute(total_vectors, dimension, self.cost_per_mb_month);

        info!(
            collection = %name,
            chunks = points.len(),
            total_vectors,
            "ingested document"
        );
        Ok(IngestOutcome {
            collection: name,
            dimension,
            chunk_count: points.len(),
            cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::error::{ProviderError, StoreError};
    use crate::models::point::{CollectionInfo, ScoredPoint};
    use crate::vector_store::memory::MemoryVectorStore;
    use crate::vector_store::Distance;

    struct FakeProvider {
        mode: DimensionMode,
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        async fn embed(
            &self,
            texts: &[String],
            dimension: u32,
        ) -> Result<Vec<Vec<f32>>, ProviderError> {
            let size = self.effective_dimension(dimension) as usize;
            Ok(texts.iter().map(|_| vec![0.5; size]).collect())
        }

        fn name(&self) -> &str {
            "fake"
        }

        fn dimension_mode(&self) -> DimensionMode {
            self.mode
        }
    }

    /// Delegates to a memory store while recording which operations ran.
    struct RecordingStore {
        inner: MemoryVectorStore,
        ops: Mutex<Vec<&'static str>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryVectorStore::new(),
                ops: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, op: &'static str) {
            self.ops.lock().unwrap().push(op);
        }
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn create_collection(
            &self,
            name: &str,
            dimension: u32,
            distance: Distance,
        ) -> Result<(), StoreError> {
            self.record("create");
            self.inner.create_collection(name, dimension, distance).await
        }

        async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
            self.record("get");
            self.inner.get_collection(name).await
        }

        async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
            self.record("delete");
            self.inner.delete_collection(name).await
        }

        async fn upsert(&self, name: &str, points: &[StoredPoint]) -> Result<(), StoreError> {
            self.record("upsert");
            self.inner.upsert(name, points).await
        }

        async fn search(
            &self,
            name: &str,
            vector: &[f32],
            limit: usize,
            score_threshold: Option<f32>,
        ) -> Result<Vec<ScoredPoint>, StoreError> {
            self.record("search");
            self.inner.search(name, vector, limit, score_threshold).await
        }

        async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
            self.record("list");
            self.inner.list_collections().await
        }
    }

    fn pipeline(
        store: Arc<dyn VectorStore>,
        mode: DimensionMode,
    ) -> IngestionPipeline {
        let gateway = Arc::new(EmbeddingGateway::new(Arc::new(FakeProvider { mode })));
        IngestionPipeline::new(
            store,
            gateway,
            Arc::new(PointIdGenerator::new()),
            ChunkBudget::default(),
            0.001,
        )
    }

    #[tokio::test]
    async fn test_ingest_text_document() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(store.clone(), DimensionMode::Configurable);

        let long = "This sentence pads the document out to force a split across chunks. "
            .repeat(30);
        let outcome = pipeline
            .ingest(&DocumentSource::Text(long), 768)
            .await
            .unwrap();

        assert_eq!(outcome.collection, "documents_fake_768d");
        assert_eq!(outcome.dimension, 768);
        assert!(outcome.chunk_count >= 2);
        assert_eq!(outcome.cost.total_vectors, outcome.chunk_count as u64);

        let info = store.get_collection("documents_fake_768d").await.unwrap().unwrap();
        assert_eq!(info.point_count, Some(outcome.chunk_count as u64));
    }

    #[tokio::test]
    async fn test_empty_document_rejected_before_store_calls() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), DimensionMode::Configurable);

        let err = pipeline
            .ingest(&DocumentSource::Text("   ".to_string()), 768)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(store.ops.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fixed_provider_overrides_requested_dimension() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(store.clone(), DimensionMode::Fixed { native: 4 });

        let outcome = pipeline
            .ingest(
                &DocumentSource::Text("A document that fits one chunk comfortably.".to_string()),
                768,
            )
            .await
            .unwrap();

        assert_eq!(outcome.dimension, 4);
        assert_eq!(outcome.collection, "documents_fake_4d");
        assert!(store.get_collection("documents_fake_4d").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cost_falls_back_to_chunk_count_without_store_count() {
        /// Delegates to a memory store but never reports a point count.
        struct CountlessStore {
            inner: MemoryVectorStore,
        }

        #[async_trait]
        impl VectorStore for CountlessStore {
            async fn create_collection(
                &self,
                name: &str,
                dimension: u32,
                distance: Distance,
            ) -> Result<(), StoreError> {
                self.inner.create_collection(name, dimension, distance).await
            }

            async fn get_collection(
                &self,
                name: &str,
            ) -> Result<Option<CollectionInfo>, StoreError> {
                Ok(self
                    .inner
                    .get_collection(name)
                    .await?
                    .map(|info| CollectionInfo {
                        point_count: None,
                        ..info
                    }))
            }

            async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
                self.inner.delete_collection(name).await
            }

            async fn upsert(&self, name: &str, points: &[StoredPoint]) -> Result<(), StoreError> {
                self.inner.upsert(name, points).await
            }

            async fn search(
                &self,
                name: &str,
                vector: &[f32],
                limit: usize,
                score_threshold: Option<f32>,
            ) -> Result<Vec<ScoredPoint>, StoreError> {
                self.inner.search(name, vector, limit, score_threshold).await
            }

            async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
                self.inner.list_collections().await
            }
        }

        let store = Arc::new(CountlessStore {
            inner: MemoryVectorStore::new(),
        });
        let pipeline = pipeline(store, DimensionMode::Configurable);

        let outcome = pipeline
            .ingest(
                &DocumentSource::Text("A short standalone document for testing.".to_string()),
                8,
            )
            .await
            .unwrap();

        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(outcome.cost.total_vectors, 1);
        assert!(outcome.cost.storage_mb > 0.0);
    }

    #[tokio::test]
    async fn test_repeat_ingest_accumulates_points() {
        let store = Arc::new(MemoryVectorStore::new());
        let pipeline = pipeline(store.clone(), DimensionMode::Configurable);
        let doc = DocumentSource::Text("A short standalone document for testing.".to_string());

        pipeline.ingest(&doc, 256).await.unwrap();
        let outcome = pipeline.ingest(&doc, 256).await.unwrap();

        // Fresh ids each call, so the second ingest adds rather than replaces.
        assert_eq!(outcome.cost.total_vectors, 2);
    }

    #[test]
    fn test_point_ids_unique_and_increasing() {
        let ids = PointIdGenerator::new();
        let mut seen = HashSet::new();
        let mut previous = 0u64;
        for _ in 0..100 {
            let base = ids.reserve(3);
            for i in 0..3 {
                let id = point_id(base, i);
                assert!(id > previous);
                assert!(seen.insert(id));
                previous = id;
            }
        }
    }

    #[test]
    fn test_large_reservations_do_not_collide() {
        let ids = PointIdGenerator::new();
        let first = ids.reserve(5000);
        let second = ids.reserve(1);
        // 5000 points span 5 base slots.
        assert!(second >= first + 5);
        assert!(point_id(second, 0) > point_id(first, 4999));
    }
}
