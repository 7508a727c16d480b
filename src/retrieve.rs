//! Query-time retrieval: fan the query out over every document collection,
//! merge hits globally, and keep only the best above the similarity
//! threshold.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collections::{CollectionIdentity, COLLECTION_PREFIX};
use crate::embedding::gateway::{EmbeddingGateway, GatewayConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use crate::models::point::ScoredPoint;
use crate::vector_store::VectorStore;

/// One retrieved chunk, tagged with the collection it came from.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub point: ScoredPoint,
    pub collection: CollectionIdentity,
}

/// The three distinct outcomes of a retrieval call. An empty knowledge base
/// and a query with no relevant matches are different situations and callers
/// phrase them differently.
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// No document collections exist at all.
    NoCollections,
    /// Collections were searched but nothing cleared the threshold.
    NoRelevantContext { collections_searched: usize },
    /// Best hits across all collections, highest score first.
    Hits(Vec<SearchHit>),
}

pub struct RetrievalPipeline {
    store: Arc<dyn VectorStore>,
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
    gateway_config: GatewayConfig,
}

impl RetrievalPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
        gateway_config: GatewayConfig,
    ) -> Self {
        Self {
            store,
            providers,
            gateway_config,
        }
    }

    /// Searches every document collection for `query`. A collection that
    /// cannot be searched (unknown provider, embedding failure, store error)
    /// is skipped with a warning rather than failing the whole call; results
    /// from the healthy collections still come back.
    pub async fn retrieve(
        &self,
        query: &str,
        similarity_threshold: f32,
        max_chunks: usize,
    ) -> Result<RetrievalOutcome, PipelineError> {
        let document_collections: Vec<String> = self
            .store
            .list_collections()
            .await?
            .into_iter()
            .filter(|name| name.starts_with(COLLECTION_PREFIX))
            .collect();
        if document_collections.is_empty() {
            return Ok(RetrievalOutcome::NoCollections);
        }

        // The same (provider, dimension) pair can back several names only by
        // accident, but embedding the query once per pair is still the right
        // unit of caching.
        let mut query_vectors: HashMap<(String, u32), Vec<f32>> = HashMap::new();
        let mut hits: Vec<SearchHit> = Vec::new();

        for name in &document_collections {
            let Some(identity) = CollectionIdentity::parse(name) else {
                warn!(collection = %name, "unparseable collection name, skipping");
                continue;
            };
            let Some(provider) = self.providers.get(&identity.provider) else {
                warn!(collection = %name, provider = %identity.provider, "no configured provider, skipping");
                continue;
            };

            let cache_key = (identity.provider.clone(), identity.dimension);
            let vector = match query_vectors.get(&cache_key) {
                Some(vector) => vector.clone(),
                None => {
                    let gateway = EmbeddingGateway::with_config(
                        Arc::clone(provider),
                        self.gateway_config.clone(),
                    );
                    match gateway.embed_one(query, identity.dimension).await {
                        Ok(vector) => {
                            query_vectors.insert(cache_key, vector.clone());
                            vector
                        }
                        Err(err) => {
                            warn!(collection = %name, "query embedding failed, skipping: {err}");
                            continue;
                        }
                    }
                }
            };

            match self.store.search(name, &vector, max_chunks, None).await {
                Ok(points) => {
                    debug!(collection = %name, found = points.len(), "searched collection");
                    hits.extend(points.into_iter().map(|point| SearchHit {
                        point,
                        collection: identity.clone(),
                    }));
                }
                Err(err) => {
                    warn!(collection = %name, "search failed, skipping: {err}");
                }
            }
        }

        // Merge before filtering: the threshold applies to the global pool,
        // and the sort is stable so equal scores keep collection order.
        hits.sort_by(|a, b| {
            b.point
                .score
                .partial_cmp(&a.point.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.retain(|h| h.point.score > similarity_threshold);
        hits.truncate(max_chunks);

        if hits.is_empty() {
            return Ok(RetrievalOutcome::NoRelevantContext {
                collections_searched: document_collections.len(),
            });
        }
        Ok(RetrievalOutcome::Hits(hits))
    }
}
