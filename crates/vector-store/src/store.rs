use crate::error::Result;
use crate::types::{AnnRequest, StoreHit};
use async_trait::async_trait;

/// Read path of a vector database holding the documentation corpus.
///
/// Implementations must be safe for concurrent use: a single handle is
/// shared by every in-flight query.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Run one nearest-neighbor query; hits come back best-first.
    async fn search(&self, request: &AnnRequest) -> Result<Vec<StoreHit>>;
}
