use crate::corpus::IndexedDocument;
use crate::embeddings::cosine_similarity;
use crate::error::{Result, VectorStoreError};
use crate::predicate::Predicate;
use crate::store::VectorStore;
use crate::types::{AnnRequest, Metric, QueryVector, StoreHit};
use async_trait::async_trait;
use std::cmp::Ordering;

/// Brute-force reference backend.
///
/// Scores every document that passes the predicate and keeps the ones whose
/// metric value falls inside `(radius, range]`, mirroring range search on a
/// similarity metric.
pub struct InMemoryVectorStore {
    documents: Vec<IndexedDocument>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new(documents: Vec<IndexedDocument>) -> Self {
        log::info!("In-memory store ready with {} documents", documents.len());
        Self { documents }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn score(metric: Metric, query: &QueryVector, stored: &QueryVector, field: &str) -> Result<f32> {
    match (query, stored) {
        (QueryVector::Sparse(q), QueryVector::Sparse(s)) => {
            let dot = q.dot(s);
            Ok(match metric {
                Metric::InnerProduct => dot,
                Metric::Cosine => {
                    let norms = q.dot(q).sqrt() * s.dot(s).sqrt();
                    if norms == 0.0 {
                        0.0
                    } else {
                        dot / norms
                    }
                }
            })
        }
        (QueryVector::Dense(q), QueryVector::Dense(s)) => {
            if q.len() != s.len() {
                return Err(VectorStoreError::InvalidDimension {
                    expected: s.len(),
                    actual: q.len(),
                });
            }
            Ok(match metric {
                Metric::InnerProduct => q.iter().zip(s).map(|(a, b)| a * b).sum(),
                Metric::Cosine => cosine_similarity(q, s),
            })
        }
        _ => Err(VectorStoreError::Other(format!(
            "Query vector kind does not match field '{field}'"
        ))),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(&self, request: &AnnRequest) -> Result<Vec<StoreHit>> {
        let predicate = Predicate::parse(&request.predicate)?;
        if request.iterative_filter {
            log::trace!("iterative filter hint ignored by in-memory store");
        }

        let mut hits = Vec::new();
        for doc in &self.documents {
            if !predicate.matches(&doc.entity) {
                continue;
            }
            let Some(stored) = doc.vectors.get(&request.field) else {
                continue;
            };
            let value = score(request.metric, &request.vector, stored, &request.field)?;
            if value > request.params.radius && value <= request.params.range {
                hits.push(StoreHit {
                    id: doc.id.clone(),
                    distance: value,
                    entity: doc.entity.clone(),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.distance
                .partial_cmp(&a.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(request.limit);

        log::debug!(
            "memory search on '{}': {} hits (limit {})",
            request.field,
            hits.len(),
            request.limit
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentAttributes, SearchParams, SparseVector};
    use std::collections::HashMap;

    fn doc(id: &str, version: &str, dense: Vec<f32>, sparse: &[(u32, f32)]) -> IndexedDocument {
        let mut vectors = HashMap::new();
        vectors.insert("dense".to_string(), QueryVector::Dense(dense));
        vectors.insert(
            "sparse".to_string(),
            QueryVector::Sparse(sparse.iter().copied().collect::<SparseVector>()),
        );
        IndexedDocument {
            id: id.to_string(),
            entity: DocumentAttributes {
                title: id.to_string(),
                version: version.to_string(),
                ..DocumentAttributes::default()
            },
            vectors,
        }
    }

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(vec![
            doc("a", "v15", vec![1.0, 0.0], &[(1, 1.0)]),
            doc("b", "v15", vec![0.8, 0.6], &[(1, 0.5), (2, 0.5)]),
            doc("c", "v14", vec![1.0, 0.0], &[(1, 1.0)]),
            doc("d", "v15", vec![0.0, 1.0], &[(3, 1.0)]),
        ])
    }

    fn request(field: &str, vector: QueryVector, metric: Metric, predicate: &str) -> AnnRequest {
        AnnRequest {
            field: field.to_string(),
            vector,
            metric,
            params: SearchParams {
                radius: 0.1,
                range: 1.0,
                nprobe: None,
            },
            limit: 10,
            predicate: predicate.to_string(),
            iterative_filter: false,
        }
    }

    #[tokio::test]
    async fn dense_cosine_respects_predicate_and_gate() {
        let store = store();
        let hits = store
            .search(&request(
                "dense",
                QueryVector::Dense(vec![1.0, 0.0]),
                Metric::Cosine,
                r#"version == "v15""#,
            ))
            .await
            .unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        // "c" is filtered by version, "d" is orthogonal and falls below the radius.
        assert_eq!(ids, vec!["a", "b"]);
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn sparse_inner_product_and_limit() {
        let store = store();
        let mut req = request(
            "sparse",
            QueryVector::Sparse([(1, 1.0)].into_iter().collect()),
            Metric::InnerProduct,
            "",
        );
        req.limit = 2;
        let hits = store.search(&req).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn malformed_predicate_is_an_error() {
        let store = store();
        let err = store
            .search(&request(
                "dense",
                QueryVector::Dense(vec![1.0, 0.0]),
                Metric::Cosine,
                "version ==",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::MalformedPredicate { .. }));
    }

    #[tokio::test]
    async fn mismatched_vector_kind_is_an_error() {
        let store = store();
        let err = store
            .search(&request(
                "dense",
                QueryVector::Sparse(SparseVector::new()),
                Metric::Cosine,
                "",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Other(_)));
    }
}
