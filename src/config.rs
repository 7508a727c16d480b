use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

// ──────────────────────────── TOML structure ────────────────────────────

#[derive(Debug, Deserialize, Clone)]
pub struct TomlConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub cost: CostConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_dimension")]
    pub openai_dimension: u32,
    #[serde(default = "default_surus_model")]
    pub surus_model: String,
    #[serde(default = "default_dimension")]
    pub default_dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            openai_model: default_openai_model(),
            openai_dimension: default_openai_dimension(),
            surus_model: default_surus_model(),
            default_dimension: default_dimension(),
        }
    }
}

fn default_openai_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_openai_dimension() -> u32 {
    1536
}
fn default_surus_model() -> String {
    "nomic-ai/nomic-embed-text-v2-moe".to_string()
}
fn default_dimension() -> u32 {
    768
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkerConfig {
    #[serde(default = "default_fixed_max_tokens")]
    pub fixed_max_tokens: usize,
    #[serde(default = "default_configurable_max_tokens")]
    pub configurable_max_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            fixed_max_tokens: default_fixed_max_tokens(),
            configurable_max_tokens: default_configurable_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
        }
    }
}

fn default_fixed_max_tokens() -> usize {
    400
}
fn default_configurable_max_tokens() -> usize {
    250
}
fn default_overlap_tokens() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_gateway_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            max_retries: default_gateway_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_batch_size() -> usize {
    16
}
fn default_concurrency() -> usize {
    4
}
fn default_gateway_max_retries() -> usize {
    2
}
fn default_initial_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_chunks: default_max_chunks(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.2
}
fn default_max_chunks() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_max_memory_tokens")]
    pub max_memory_tokens: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            max_tokens: default_completion_max_tokens(),
            system_prompt: default_system_prompt(),
            max_memory_tokens: default_max_memory_tokens(),
        }
    }
}

fn default_completion_model() -> String {
    "Qwen/Qwen3-1.7B".to_string()
}
fn default_completion_max_tokens() -> u32 {
    500
}
fn default_system_prompt() -> String {
    "You are a helpful assistant. Answer using only the provided context. \
     If the context does not contain the answer, say so."
        .to_string()
}
fn default_max_memory_tokens() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CostConfig {
    #[serde(default = "default_cost_per_mb_month")]
    pub per_mb_month: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            per_mb_month: default_cost_per_mb_month(),
        }
    }
}

fn default_cost_per_mb_month() -> f64 {
    0.001
}

// ──────────────────────────── Resolved Settings ────────────────────────────

/// Flat settings structure resolved from TOML + environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    // Vector store
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,

    // Embedding providers
    pub openai_model: String,
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub openai_dimension: u32,
    pub surus_model: String,
    pub surus_api_key: String,
    pub surus_api_url: String,
    pub default_dimension: u32,

    // Chunker
    pub fixed_max_tokens: usize,
    pub configurable_max_tokens: usize,
    pub overlap_tokens: usize,

    // Gateway
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_retries: usize,
    pub initial_backoff: Duration,

    // Retrieval
    pub similarity_threshold: f32,
    pub max_chunks: usize,

    // Completion
    pub completion_model: String,
    pub completion_max_tokens: u32,
    pub system_prompt: String,
    pub max_memory_tokens: usize,

    // Cost model
    pub cost_per_mb_month: f64,
}

/// Load settings from a given TOML path. Missing file means all defaults.
pub fn load_settings_from_path(path: impl AsRef<Path>) -> anyhow::Result<Settings> {
    // Load .env if present (ignore errors)
    let _ = dotenvy::dotenv();

    let config: TomlConfig = match std::fs::read_to_string(path.as_ref()) {
        Ok(content) => toml::from_str(&content)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => toml::from_str("")?,
        Err(err) => return Err(err.into()),
    };

    let qdrant_url =
        std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://localhost:6333".to_string());
    let qdrant_api_key = std::env::var("QDRANT_API_KEY").ok();

    let openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    let openai_api_url =
        std::env::var("OPENAI_API_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let surus_api_key = std::env::var("SURUS_API_KEY").unwrap_or_default();
    let surus_api_url =
        std::env::var("SURUS_API_URL").unwrap_or_else(|_| "https://api.surus.dev/v1".to_string());

    Ok(Settings {
        qdrant_url,
        qdrant_api_key,
        openai_model: config.embedding.openai_model,
        openai_api_key,
        openai_api_url,
        openai_dimension: config.embedding.openai_dimension,
        surus_model: config.embedding.surus_model,
        surus_api_key,
        surus_api_url,
        default_dimension: config.embedding.default_dimension,
        fixed_max_tokens: config.chunker.fixed_max_tokens,
        configurable_max_tokens: config.chunker.configurable_max_tokens,
        overlap_tokens: config.chunker.overlap_tokens,
        batch_size: config.gateway.batch_size,
        concurrency: config.gateway.concurrency,
        max_retries: config.gateway.max_retries,
        initial_backoff: Duration::from_millis(config.gateway.initial_backoff_ms),
        similarity_threshold: config.retrieval.similarity_threshold,
        max_chunks: config.retrieval.max_chunks,
        completion_model: config.completion.model,
        completion_max_tokens: config.completion.max_tokens,
        system_prompt: config.completion.system_prompt,
        max_memory_tokens: config.completion.max_memory_tokens,
        cost_per_mb_month: config.cost.per_mb_month,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_toml() {
        unsafe { std::env::set_var("QDRANT_URL", "http://qdrant.internal:6333") };
        unsafe { std::env::set_var("SURUS_API_KEY", "sk-surus-test") };

        let toml_content = r#"
[embedding]
openai_model = "text-embedding-3-large"
openai_dimension = 1536
surus_model = "nomic-ai/nomic-embed-text-v2-moe"
default_dimension = 256

[chunker]
fixed_max_tokens = 300
configurable_max_tokens = 200
overlap_tokens = 40

[gateway]
batch_size = 8
concurrency = 2
max_retries = 3
initial_backoff_ms = 250

[retrieval]
similarity_threshold = 0.35
max_chunks = 4

[completion]
model = "Qwen/Qwen3-1.7B"
max_tokens = 400
max_memory_tokens = 800

[cost]
per_mb_month = 0.002
"#;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(toml_content.as_bytes()).unwrap();
        let settings = load_settings_from_path(tmp.path()).unwrap();

        assert_eq!(settings.qdrant_url, "http://qdrant.internal:6333");
        assert_eq!(settings.surus_api_key, "sk-surus-test");
        assert_eq!(settings.default_dimension, 256);
        assert_eq!(settings.fixed_max_tokens, 300);
        assert_eq!(settings.batch_size, 8);
        assert_eq!(settings.initial_backoff, Duration::from_millis(250));
        assert!((settings.similarity_threshold - 0.35).abs() < f32::EPSILON);
        assert_eq!(settings.max_chunks, 4);
        assert_eq!(settings.completion_max_tokens, 400);
        assert_eq!(settings.max_memory_tokens, 800);
        assert!((settings.cost_per_mb_month - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"").unwrap();
        let settings = load_settings_from_path(tmp.path()).unwrap();

        assert_eq!(settings.openai_model, "text-embedding-3-large");
        assert_eq!(settings.openai_dimension, 1536);
        assert_eq!(settings.default_dimension, 768);
        assert_eq!(settings.batch_size, 16);
        assert_eq!(settings.concurrency, 4);
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.initial_backoff, Duration::from_secs(1));
        assert!((settings.similarity_threshold - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.max_chunks, 5);
        assert_eq!(settings.completion_model, "Qwen/Qwen3-1.7B");
        assert!((settings.cost_per_mb_month - 0.001).abs() < 1e-12);
    }
}
