//! Collection naming and lifecycle.
//!
//! Every (provider, dimension) pair maps to exactly one collection named
//! `documents_{provider}_{dimension}d`. The name is the only place this
//! identity is recorded, so parsing it back must stay in lockstep with
//! formatting.

use std::fmt;

use tracing::info;

use crate::error::StoreError;
use crate::vector_store::{Distance, VectorStore};

pub const COLLECTION_PREFIX: &str = "documents_";

/// The (provider, dimension) pair a collection stores vectors for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionIdentity {
    pub provider: String,
    pub dimension: u32,
}

impl CollectionIdentity {
    pub fn new(provider: &str, dimension: u32) -> Self {
        Self {
            provider: provider.to_string(),
            dimension,
        }
    }

    pub fn name(&self) -> String {
        format!("{COLLECTION_PREFIX}{}_{}d", self.provider, self.dimension)
    }

    /// Parses a collection name produced by [`name`](Self::name). Returns
    /// `None` for names outside the convention, including other collections
    /// living in the same store.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(COLLECTION_PREFIX)?;
        let (provider, dim_part) = rest.rsplit_once('_')?;
        if provider.is_empty() {
            return None;
        }
        let dimension: u32 = dim_part.strip_suffix('d')?.parse().ok()?;
        Some(Self {
            provider: provider.to_string(),
            dimension,
        })
    }
}

impl fmt::Display for CollectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Makes sure the collection for `identity` exists with the right vector
/// size. A collection created at a different dimension is dropped and
/// recreated, discarding its points; vectors of mixed sizes cannot share a
/// collection.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    identity: &CollectionIdentity,
) -> Result<(), StoreError> {
    let name = identity.name();
    match store.get_collection(&name).await? {
        Some(info) if info.dimension == identity.dimension => Ok(()),
        Some(info) => {
            info!(
                collection = %name,
                existing = info.dimension,
                wanted = identity.dimension,
                "dimension changed, recreating collection"
            );
            store.delete_collection(&name).await?;
            store
                .create_collection(&name, identity.dimension, Distance::Cosine)
                .await
        }
        None => {
            info!(collection = %name, dimension = identity.dimension, "creating collection");
            store
                .create_collection(&name, identity.dimension, Distance::Cosine)
                .await
        }
    }
}
