use serde::{Deserialize, Serialize};

use crate::models::chunk::SourceFormat;

/// Dimension every storage-cost comparison is made against (OpenAI 1536D).
pub const BASELINE_DIMENSION: u32 = 1536;

const BYTES_PER_FLOAT: u64 = 4;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Payload persisted alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    /// RFC3339 capture time of the ingestion call.
    pub timestamp: String,
    pub dimension: u32,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_format: Option<SourceFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_index: Option<usize>,
    pub estimated_tokens: usize,
}

/// A vector plus payload as written to the store. Created at ingestion,
/// never mutated, removed only by collection deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// A stored point as returned from a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: PointPayload,
}

/// What the store reports about an existing collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionInfo {
    pub dimension: u32,
    /// Stored point count; `None` when the store cannot report one.
    pub point_count: Option<u64>,
}

/// Storage cost estimate for a collection, derived from the byte cost model
/// `dimension * 4` bytes per vector.
#[derive(Debug, Clone, Serialize)]
pub struct CostMetrics {
    pub total_vectors: u64,
    pub storage_mb: f64,
    pub monthly_cost_usd: f64,
    /// Percentage saved against the 1536D baseline; `None` when the
    /// dimension equals the baseline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_percent: Option<f64>,
}

impl CostMetrics {
    pub fn compute(vector_count: u64, dimension: u32, cost_per_mb_month: f64) -> Self {
        let total_mb = (vector_count * dimension as u64 * BYTES_PER_FLOAT) as f64 / BYTES_PER_MB;
        let monthly_cost_usd = total_mb * cost_per_mb_month;

        let savings_percent = if dimension != BASELINE_DIMENSION && vector_count > 0 {
            let baseline_mb =
                (vector_count * BASELINE_DIMENSION as u64 * BYTES_PER_FLOAT) as f64 / BYTES_PER_MB;
            let baseline_cost = baseline_mb * cost_per_mb_month;
            if baseline_cost > 0.0 {
                Some((baseline_cost - monthly_cost_usd) / baseline_cost * 100.0)
            } else {
                None
            }
        } else {
            None
        };

        Self {
            total_vectors: vector_count,
            storage_mb: total_mb,
            monthly_cost_usd,
            savings_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_savings_against_baseline() {
        let metrics = CostMetrics::compute(1000, 768, 0.001);
        // 768D is half the 1536D baseline.
        let savings = metrics.savings_percent.unwrap();
        assert!((savings - 50.0).abs() < 1e-9);
        assert_eq!(metrics.total_vectors, 1000);
    }

    #[test]
    fn test_cost_no_savings_at_baseline() {
        let metrics = CostMetrics::compute(1000, BASELINE_DIMENSION, 0.001);
        assert!(metrics.savings_percent.is_none());
    }

    #[test]
    fn test_cost_storage_size() {
        let metrics = CostMetrics::compute(1024, 256, 0.001);
        // 1024 vectors * 256 floats * 4 bytes = 1 MB exactly.
        assert!((metrics.storage_mb - 1.0).abs() < 1e-9);
        assert!((metrics.monthly_cost_usd - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = PointPayload {
            text: "chunk text".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            dimension: 768,
            provider: "surus".to_string(),
            source_format: Some(SourceFormat::Array),
            source_key: None,
            original_index: Some(2),
            estimated_tokens: 3,
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: PointPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.provider, "surus");
        assert_eq!(back.original_index, Some(2));
        assert!(back.source_key.is_none());
    }
}
