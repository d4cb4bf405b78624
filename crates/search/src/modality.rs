use crate::query::Threshold;
use docqa_vector_store::{
    AnnRequest, CorpusFields, DocumentAttributes, Metric, QueryVector, SearchParams, StoreHit,
    VectorStore,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One of the three independent retrieval signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modality {
    /// Lexical term weights over document titles.
    Sparse,
    /// Semantic embedding of the prose.
    DenseText,
    /// Semantic embedding of the code snippets.
    DenseCode,
}

impl Modality {
    pub const ALL: [Self; 3] = [Self::Sparse, Self::DenseText, Self::DenseCode];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sparse => "sparse",
            Self::DenseText => "dense_text",
            Self::DenseCode => "dense_code",
        }
    }

    #[must_use]
    pub const fn metric(self) -> Metric {
        match self {
            Self::Sparse => Metric::InnerProduct,
            Self::DenseText | Self::DenseCode => Metric::Cosine,
        }
    }

    #[must_use]
    pub fn field(self, fields: &CorpusFields) -> &str {
        match self {
            Self::Sparse => &fields.sparse_title,
            Self::DenseText => &fields.dense_text,
            Self::DenseCode => &fields.dense_code,
        }
    }
}

/// Canonical per-modality hit; every backend row is converted to this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityHit {
    pub document_id: String,
    pub raw_distance: f32,
    pub entity: DocumentAttributes,
}

impl From<StoreHit> for ModalityHit {
    fn from(hit: StoreHit) -> Self {
        Self {
            document_id: hit.id,
            raw_distance: hit.distance,
            entity: hit.entity,
        }
    }
}

/// Result of one modality's backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalityOutcome {
    Success(Vec<ModalityHit>),
    Failure { reason: String },
}

impl ModalityOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Collapse to hits; a failed modality contributes nothing.
    #[must_use]
    pub fn into_hits(self) -> Vec<ModalityHit> {
        match self {
            Self::Success(hits) => hits,
            Self::Failure { .. } => Vec::new(),
        }
    }
}

/// Everything one modality search needs besides the shared client.
#[derive(Debug, Clone)]
pub struct ModalityRequest<'a> {
    pub modality: Modality,
    pub field: &'a str,
    pub vector: QueryVector,
    pub predicate: &'a str,
    pub top_k: usize,
    pub threshold: Threshold,
    pub iterative_filter: bool,
}

/// Issues per-modality nearest-neighbor calls with failure isolation.
#[derive(Clone)]
pub struct ModalitySearchClient {
    store: Arc<dyn VectorStore>,
    timeout: Duration,
    nprobe: u32,
}

impl ModalitySearchClient {
    #[must_use]
    pub fn new(store: Arc<dyn VectorStore>, timeout: Duration, nprobe: u32) -> Self {
        Self {
            store,
            timeout,
            nprobe,
        }
    }

    fn ann_request(&self, request: &ModalityRequest<'_>) -> AnnRequest {
        let nprobe = match request.modality.metric() {
            Metric::Cosine => Some(self.nprobe),
            Metric::InnerProduct => None,
        };
        AnnRequest {
            field: request.field.to_string(),
            vector: request.vector.clone(),
            metric: request.modality.metric(),
            params: SearchParams {
                radius: request.threshold.radius,
                range: request.threshold.range,
                nprobe,
            },
            limit: request.top_k,
            predicate: request.predicate.to_string(),
            iterative_filter: request.iterative_filter,
        }
    }

    /// Run one modality search. Errors and timeouts never escape: they come
    /// back as [`ModalityOutcome::Failure`] after being logged.
    pub async fn search_modality(&self, request: ModalityRequest<'_>) -> ModalityOutcome {
        let modality = request.modality;
        let ann = self.ann_request(&request);
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.store.search(&ann)).await {
            Ok(Ok(hits)) => {
                ModalityOutcome::Success(hits.into_iter().map(ModalityHit::from).collect())
            }
            Ok(Err(err)) => ModalityOutcome::Failure {
                reason: err.to_string(),
            },
            Err(_) => ModalityOutcome::Failure {
                reason: format!("timed out after {} ms", self.timeout.as_millis()),
            },
        };

        match &outcome {
            ModalityOutcome::Success(hits) => log::debug!(
                "{} search on {} '{}': {} hits in {:?}",
                modality.as_str(),
                self.store.name(),
                ann.field,
                hits.len(),
                started.elapsed()
            ),
            ModalityOutcome::Failure { reason } => log::warn!(
                "{} search on {} '{}' failed, continuing without it: {reason}",
                modality.as_str(),
                self.store.name(),
                ann.field
            ),
        }

        outcome
    }
}
