//! Engine wiring: builds the provider set, store, and pipelines from
//! resolved settings and exposes the high-level ingest / query / chat
//! operations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::collections::COLLECTION_PREFIX;
use crate::completion::openai::OpenAiCompletionModel;
use crate::completion::CompletionModel;
use crate::config::Settings;
use crate::embedding::gateway::{EmbeddingGateway, GatewayConfig};
use crate::embedding::openai::OpenAiEmbeddingProvider;
use crate::embedding::surus::SurusEmbeddingProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, StoreError};
use crate::ingest::{ChunkBudget, IngestOutcome, IngestionPipeline, PointIdGenerator};
use crate::models::chunk::DocumentSource;
use crate::prompt::{build_prompt, ConversationMessage};
use crate::retrieve::{RetrievalOutcome, RetrievalPipeline, SearchHit};
use crate::vector_store::qdrant::QdrantStore;
use crate::vector_store::VectorStore;

/// A chat answer plus the retrieved chunks it was grounded on.
#[derive(Debug)]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<SearchHit>,
}

pub struct RagEngine {
    settings: Settings,
    store: Arc<dyn VectorStore>,
    providers: HashMap<String, Arc<dyn EmbeddingProvider>>,
    completion: Arc<dyn CompletionModel>,
    ids: Arc<PointIdGenerator>,
}

impl RagEngine {
    /// Builds the engine against the configured Qdrant endpoint.
    pub fn from_settings(settings: Settings) -> Result<Self, StoreError> {
        let store = Arc::new(QdrantStore::new(
            &settings.qdrant_url,
            settings.qdrant_api_key.as_deref(),
        )?);
        let completion = Arc::new(OpenAiCompletionModel::new(
            &settings.completion_model,
            &settings.surus_api_key,
            &settings.surus_api_url,
        ));
        Ok(Self::with_backends(settings, store, completion))
    }

    /// Builds the engine over caller-supplied backends. Tests use this with
    /// an in-memory store and stub models.
    pub fn with_backends(
        settings: Settings,
        store: Arc<dyn VectorStore>,
        completion: Arc<dyn CompletionModel>,
    ) -> Self {
        let mut providers: HashMap<String, Arc<dyn EmbeddingProvider>> = HashMap::new();
        let openai = OpenAiEmbeddingProvider::new(
            &settings.openai_model,
            &settings.openai_api_key,
            &settings.openai_api_url,
            settings.openai_dimension,
        );
        providers.insert(openai.name().to_string(), Arc::new(openai));
        let surus = SurusEmbeddingProvider::new(
            &settings.surus_model,
            &settings.surus_api_key,
            &settings.surus_api_url,
        );
        providers.insert(surus.name().to_string(), Arc::new(surus));

        Self {
            settings,
            store,
            providers,
            completion,
            ids: Arc::new(PointIdGenerator::new()),
        }
    }

    /// Registers or replaces an embedding provider under its own name.
    pub fn register_provider(&mut self, provider: Arc<dyn EmbeddingProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            batch_size: self.settings.batch_size,
            concurrency: self.settings.concurrency,
            max_retries: self.settings.max_retries,
            initial_backoff: self.settings.initial_backoff,
        }
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn EmbeddingProvider>, PipelineError> {
        self.providers
            .get(name)
            .ok_or_else(|| PipelineError::Validation(format!("unknown embedding provider: {name}")))
    }

    /// Ingests one document through the named provider. `dimension`, when
    /// absent, falls back to the configured default; fixed-dimension
    /// providers override it either way.
    pub async fn ingest(
        &self,
        source: &DocumentSource,
        provider_name: &str,
        dimension: Option<u32>,
    ) -> Result<IngestOutcome, PipelineError> {
        let provider = self.provider(provider_name)?;
        let requested = dimension.unwrap_or(self.settings.default_dimension);
        if requested == 0 {
            return Err(PipelineError::Validation(
                "embedding dimension must be positive".to_string(),
            ));
        }

        let gateway = Arc::new(EmbeddingGateway::with_config(
            Arc::clone(provider),
            self.gateway_config(),
        ));
        let pipeline = IngestionPipeline::new(
            Arc::clone(&self.store),
            gateway,
            Arc::clone(&self.ids),
            ChunkBudget {
                fixed_max_tokens: self.settings.fixed_max_tokens,
                configurable_max_tokens: self.settings.configurable_max_tokens,
                overlap_tokens: self.settings.overlap_tokens,
            },
            self.settings.cost_per_mb_month,
        );
        pipeline.ingest(source, requested).await
    }

    /// Searches every document collection for chunks relevant to `query`.
    pub async fn query(&self, query: &str) -> Result<RetrievalOutcome, PipelineError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation("query must not be empty".to_string()));
        }
        let pipeline = RetrievalPipeline::new(
            Arc::clone(&self.store),
            self.providers.clone(),
            self.gateway_config(),
        );
        pipeline
            .retrieve(
                trimmed,
                self.settings.similarity_threshold,
                self.settings.max_chunks,
            )
            .await
    }

    /// Answers `message` with retrieved context and trimmed conversation
    /// memory. Retrieval outcomes with no usable context become fixed
    /// replies without a completion call.
    pub async fn chat(
        &self,
        memory: &[ConversationMessage],
        message: &str,
    ) -> Result<ChatReply, PipelineError> {
        let sources = match self.query(message).await? {
            RetrievalOutcome::NoCollections => {
                return Ok(ChatReply {
                    response: "The knowledge base is empty. Add documents before asking questions."
                        .to_string(),
                    sources: Vec::new(),
                });
            }
            RetrievalOutcome::NoRelevantContext { collections_searched } => {
                info!(collections_searched, "no relevant context for chat message");
                return Ok(ChatReply {
                    response: "I could not find relevant information in the knowledge base for that question."
                        .to_string(),
                    sources: Vec::new(),
                });
            }
            RetrievalOutcome::Hits(hits) => hits,
        };

        let context = sources
            .iter()
            .map(|hit| hit.point.payload.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = build_prompt(
            &self.settings.system_prompt,
            memory,
            &context,
            message,
            self.settings.max_memory_tokens,
        );
        let response = self
            .completion
            .complete(&messages, self.settings.completion_max_tokens)
            .await?;
        Ok(ChatReply { response, sources })
    }

    /// Deletes every document collection. Collections that fail to delete
    /// are logged and skipped; the call reports how many were removed.
    pub async fn clear_knowledge_base(&self) -> Result<usize, PipelineError> {
        let names: Vec<String> = self
            .store
            .list_collections()
            .await
            .map_err(PipelineError::from)?
            .into_iter()
            .filter(|name| name.starts_with(COLLECTION_PREFIX))
            .collect();

        let mut deleted = 0;
        for name in &names {
            match self.store.delete_collection(name).await {
                Ok(()) => deleted += 1,
                Err(err) => warn!(collection = %name, "failed to delete collection: {err}"),
            }
        }
        info!(deleted, total = names.len(), "cleared knowledge base");
        Ok(deleted)
    }
}
