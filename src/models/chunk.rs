use serde::{Deserialize, Serialize};

/// Shape of the input a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Text,
    Array,
    Json,
}

/// A bounded segment of source text with metadata tracing it to its origin.
/// Immutable once produced; consumed once to yield a vector, then persisted
/// as point payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_format: SourceFormat,
    /// Key of the originating entry for key-value input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    /// Position of the originating item for array input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_index: Option<usize>,
    /// Position of this chunk within its originating item.
    pub chunk_index: usize,
    /// Number of chunks the originating item produced.
    pub total_chunks: usize,
}

/// Raw content accepted by the ingestion pipeline. Structured variants are
/// chunked item by item, preserving input order.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Text(String),
    Items(Vec<String>),
    KeyValues(Vec<(String, String)>),
}
