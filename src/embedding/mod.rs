pub mod gateway;
pub mod openai;
pub mod surus;

use async_trait::async_trait;

use crate::error::ProviderError;

/// How a provider treats the requested embedding dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionMode {
    /// The provider always returns its native size; requested dimensions are
    /// ignored.
    Fixed { native: u32 },
    /// The provider serves any requested size by truncating a longer native
    /// representation (matryoshka).
    Configurable,
}

/// Abstract embedding provider interface.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one batch of texts at the requested dimension. Order-preserving:
    /// one output vector per input text, in input order.
    async fn embed(&self, texts: &[String], dimension: u32)
        -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Stable provider name, used in collection identities.
    fn name(&self) -> &str;

    fn dimension_mode(&self) -> DimensionMode;

    /// Dimension vectors will actually have for a given request.
    fn effective_dimension(&self, requested: u32) -> u32 {
        match self.dimension_mode() {
            DimensionMode::Fixed { native } => native,
            DimensionMode::Configurable => requested,
        }
    }
}
