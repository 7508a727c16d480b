//! Multi-provider RAG ingestion and retrieval over a Qdrant-style vector
//! store.
//!
//! Documents are chunked by an estimated token budget, embedded through a
//! batching gateway, and stored in per-(provider, dimension) collections.
//! Queries fan out across every collection, merge hits globally, and feed a
//! memory-bounded prompt to a chat completion model.

pub mod app;
pub mod chunker;
pub mod collections;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod vector_store;

pub use app::{ChatReply, RagEngine};
pub use error::{PipelineError, ProviderError, StoreError};
