use crate::error::{Result, SearchError};
use docqa_vector_store::{Embedder, SparseVector, VectorStoreError};
use std::sync::Arc;
use std::time::Duration;

/// The three query-side vectors for one hybrid query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    /// Lexical weights of the text query.
    pub sparse_terms: SparseVector,
    pub dense_text: Vec<f32>,
    pub dense_code: Vec<f32>,
}

/// Wraps the process-wide encoder with a timeout and shape checks.
#[derive(Clone)]
pub struct QueryEmbedder {
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
    dimension: usize,
}

impl QueryEmbedder {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, timeout: Duration, dimension: usize) -> Self {
        Self {
            embedder,
            timeout,
            dimension,
        }
    }

    /// Encode the text and code queries in one batched call.
    ///
    /// Any failure here is fatal for the query: no modality can run without
    /// its vector.
    pub async fn embed(&self, text_query: &str, code_query: &str) -> Result<QueryEmbedding> {
        let inputs = [text_query.to_string(), code_query.to_string()];
        let encoded = tokio::time::timeout(self.timeout, self.embedder.encode(&inputs))
            .await
            .map_err(|_| {
                SearchError::Embedding(VectorStoreError::EmbeddingError(format!(
                    "encoder timed out after {} ms",
                    self.timeout.as_millis()
                )))
            })?
            .map_err(SearchError::Embedding)?;

        let mut encoded = encoded.into_iter();
        let (Some(text), Some(code), None) = (encoded.next(), encoded.next(), encoded.next()) else {
            return Err(SearchError::Embedding(VectorStoreError::EmbeddingError(
                "encoder must return exactly two embeddings".to_string(),
            )));
        };

        for dense in [&text.dense, &code.dense] {
            if dense.len() != self.dimension {
                return Err(SearchError::Embedding(VectorStoreError::InvalidDimension {
                    expected: self.dimension,
                    actual: dense.len(),
                }));
            }
        }

        Ok(QueryEmbedding {
            sparse_terms: text.sparse,
            dense_text: text.dense,
            dense_code: code.dense,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_vector_store::StubEmbedder;

    #[tokio::test]
    async fn embeds_both_queries_in_one_call() {
        let stub = Arc::new(StubEmbedder::new(8));
        let embedder = QueryEmbedder::new(stub.clone(), Duration::from_secs(1), 8);

        let embedding = embedder.embed("app router", "export default function Page() {}").await.unwrap();
        assert_eq!(stub.calls(), 1);
        assert_eq!(embedding.dense_text.len(), 8);
        assert_eq!(embedding.dense_code.len(), 8);
        assert!(!embedding.sparse_terms.is_empty());
        assert_ne!(embedding.dense_text, embedding.dense_code);
    }

    #[tokio::test]
    async fn unexpected_dimension_is_an_embedding_failure() {
        let embedder = QueryEmbedder::new(Arc::new(StubEmbedder::new(8)), Duration::from_secs(1), 1024);
        let err = embedder.embed("routing", "").await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Embedding(VectorStoreError::InvalidDimension {
                expected: 1024,
                actual: 8
            })
        ));
    }
}
