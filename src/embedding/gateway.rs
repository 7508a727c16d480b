//! Concurrency-bounded, batching front end over an embedding provider.
//!
//! Inputs are grouped into fixed-size batches and dispatched through an
//! explicit job queue to a fixed number of workers. Each worker writes its
//! vectors back with the batch's input offset, so completion order never
//! affects output order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::EmbeddingProvider;
use crate::chunker;
use crate::error::ProviderError;

/// Tuning knobs for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Texts per provider request.
    pub batch_size: usize,
    /// Maximum in-flight provider requests.
    pub concurrency: usize,
    /// Additional attempts after the first failure of a batch.
    pub max_retries: usize,
    /// First backoff delay; doubles per retry.
    pub initial_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            concurrency: 4,
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    config: GatewayConfig,
}

struct BatchJob {
    offset: usize,
    texts: Vec<String>,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_config(provider, GatewayConfig::default())
    }

    pub fn with_config(provider: Arc<dyn EmbeddingProvider>, config: GatewayConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embeds `texts` at `dimension`, returning one vector per input in
    /// input order. A batch that still fails after all retries fails the
    /// whole call; contract violations surface without retry.
    pub async fn embed_batch(
        &self,
        texts: &[String],
        dimension: u32,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // The backing models reject inputs past the token ceiling, so clamp
        // every text here regardless of how the caller chunked.
        let clamped: Vec<String> = texts
            .iter()
            .map(|t| chunker::enforce_token_ceiling(t))
            .collect();
        let total = clamped.len();

        let jobs: Vec<BatchJob> = clamped
            .chunks(self.config.batch_size)
            .enumerate()
            .map(|(i, batch)| BatchJob {
                offset: i * self.config.batch_size,
                texts: batch.to_vec(),
            })
            .collect();
        let job_count = jobs.len();

        let (job_tx, job_rx) = mpsc::channel::<BatchJob>(job_count);
        for job in jobs {
            // The queue is sized to hold every batch, so this cannot block.
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);
        let job_rx = Arc::new(Mutex::new(job_rx));

        type BatchOutcome = (usize, Result<Vec<Vec<f32>>, ProviderError>);
        let (result_tx, mut result_rx) = mpsc::channel::<BatchOutcome>(job_count);

        let workers = self.config.concurrency.min(job_count).max(1);
        debug!(total, batches = job_count, workers, "dispatching embedding batches");

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let provider = Arc::clone(&self.provider);
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let max_retries = self.config.max_retries;
            let initial_backoff = self.config.initial_backoff;
            handles.push(tokio::spawn(async move {
                loop {
                    let job = { job_rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    let outcome = embed_with_retry(
                        provider.as_ref(),
                        &job.texts,
                        dimension,
                        max_retries,
                        initial_backoff,
                    )
                    .await;
                    if result_tx.send((job.offset, outcome)).await.is_err() {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        // Results land positionally in a pre-sized slot array; workers own
        // disjoint offset ranges, so interleaving cannot reorder anything.
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; total];
        let mut first_error: Option<(usize, ProviderError)> = None;
        while let Some((offset, outcome)) = result_rx.recv().await {
            match outcome {
                Ok(vectors) => {
                    for (i, vector) in vectors.into_iter().enumerate() {
                        slots[offset + i] = Some(vector);
                    }
                }
                Err(err) => {
                    if first_error.as_ref().map_or(true, |(o, _)| offset < *o) {
                        first_error = Some((offset, err));
                    }
                }
            }
        }
        for handle in handles {
            let _ = handle.await;
        }

        if let Some((offset, err)) = first_error {
            warn!(offset, "embedding batch failed: {err}");
            return Err(err);
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    ProviderError::Contract("provider returned fewer vectors than inputs".into())
                })
            })
            .collect()
    }

    /// One-text convenience wrapper over [`embed_batch`](Self::embed_batch).
    pub async fn embed_one(&self, text: &str, dimension: u32) -> Result<Vec<f32>, ProviderError> {
        let vectors = self.embed_batch(&[text.to_string()], dimension).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Contract("no embedding returned".into()))
    }
}

async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    dimension: u32,
    max_retries: usize,
    initial_backoff: Duration,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut attempt = 0usize;
    loop {
        match provider.embed(texts, dimension).await {
            Ok(vectors) => return Ok(vectors),
            Err(err) => {
                if !err.is_retryable() || attempt >= max_retries {
                    return Err(err);
                }
                let backoff = initial_backoff * (1u32 << attempt.min(5));
                debug!(attempt, "embedding batch failed, retrying in {backoff:?}: {err}");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
