use crate::config::SearchConfig;
use crate::embedding::{QueryEmbedder, QueryEmbedding};
use crate::error::Result;
use crate::filter::compose_filter;
use crate::fusion::{merge, rank, RankedResult};
use crate::modality::{Modality, ModalityOutcome, ModalityRequest, ModalitySearchClient};
use crate::query::HybridQuery;
use docqa_vector_store::{CorpusFields, Embedder, QueryVector, VectorStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Hybrid search over sparse, dense-text and dense-code signals with
/// weighted score fusion.
///
/// The backend and encoder handles are injected once at startup and shared by
/// every query; `HybridSearch` itself holds no per-query state, so one
/// instance can serve concurrent callers.
#[derive(Clone)]
pub struct HybridSearch {
    embedder: QueryEmbedder,
    client: ModalitySearchClient,
    fields: CorpusFields,
}

impl HybridSearch {
    #[must_use]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            embedder: QueryEmbedder::new(embedder, config.embed_timeout(), config.dense_dim),
            client: ModalitySearchClient::new(store, config.modality_timeout(), config.nprobe),
            fields: config.fields.clone(),
        }
    }

    /// Run the full pipeline: validate, compose the filter, embed, search the
    /// weighted modalities concurrently, fuse and keep the best `top_k`.
    ///
    /// Dropping the returned future cancels in-flight modality calls.
    pub async fn search(&self, query: &HybridQuery) -> Result<Vec<RankedResult>> {
        query.validate()?;
        let started = Instant::now();

        let predicate = compose_filter(&query.version_scope, query.filter_expr.as_deref());
        log::debug!(
            "Hybrid search: version='{}', top_k={}, predicate='{}'",
            query.version_scope,
            query.top_k,
            predicate
        );

        let embedding = self
            .embedder
            .embed(&query.text_query, &query.code_query)
            .await?;

        let (sparse, dense_text, dense_code) = tokio::join!(
            self.run_modality(Modality::Sparse, query, &embedding, &predicate),
            self.run_modality(Modality::DenseText, query, &embedding, &predicate),
            self.run_modality(Modality::DenseCode, query, &embedding, &predicate),
        );

        let mut hits_by_modality = BTreeMap::new();
        let mut failed = 0usize;
        for (modality, outcome) in [sparse, dense_text, dense_code].into_iter().flatten() {
            if outcome.is_failure() {
                failed += 1;
            }
            hits_by_modality.insert(modality, outcome.into_hits());
        }

        let candidates = merge(hits_by_modality);
        let merged = candidates.len();
        let results = rank(candidates, &query.weights, query.top_k);

        log::info!(
            "Hybrid search completed: {} results from {merged} candidates ({failed} modality failures) in {:?}",
            results.len(),
            started.elapsed()
        );
        Ok(results)
    }

    /// `None` when the modality carries no weight: no backend call is made.
    async fn run_modality(
        &self,
        modality: Modality,
        query: &HybridQuery,
        embedding: &QueryEmbedding,
        predicate: &str,
    ) -> Option<(Modality, ModalityOutcome)> {
        if query.weights.get(modality) == 0.0 {
            return None;
        }

        let vector = match modality {
            Modality::Sparse => QueryVector::Sparse(embedding.sparse_terms.clone()),
            Modality::DenseText => QueryVector::Dense(embedding.dense_text.clone()),
            Modality::DenseCode => QueryVector::Dense(embedding.dense_code.clone()),
        };

        let outcome = self
            .client
            .search_modality(ModalityRequest {
                modality,
                field: modality.field(&self.fields),
                vector,
                predicate,
                top_k: query.top_k,
                threshold: query.thresholds.get(modality),
                iterative_filter: query.iterative_filter,
            })
            .await;
        Some((modality, outcome))
    }
}
