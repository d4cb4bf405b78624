use crate::error::{Result, SearchError};
use crate::modality::Modality;
use docqa_protocol::{SearchRequest, DEFAULT_RADIUS, DEFAULT_RANGE};

/// Relative importance of each retrieval signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModalityWeights {
    pub sparse: f32,
    pub dense_text: f32,
    pub dense_code: f32,
}

impl ModalityWeights {
    #[must_use]
    pub const fn new(sparse: f32, dense_text: f32, dense_code: f32) -> Self {
        Self {
            sparse,
            dense_text,
            dense_code,
        }
    }

    #[must_use]
    pub const fn get(&self, modality: Modality) -> f32 {
        match modality {
            Modality::Sparse => self.sparse,
            Modality::DenseText => self.dense_text,
            Modality::DenseCode => self.dense_code,
        }
    }

    /// Modalities that take part in the query.
    pub fn active(&self) -> impl Iterator<Item = Modality> + '_ {
        Modality::ALL
            .into_iter()
            .filter(move |m| self.get(*m) != 0.0)
    }
}

impl Default for ModalityWeights {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Similarity gate applied by the backend before ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub radius: f32,
    pub range: f32,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            range: DEFAULT_RANGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModalityThresholds {
    pub sparse: Threshold,
    pub dense_text: Threshold,
    pub dense_code: Threshold,
}

impl ModalityThresholds {
    #[must_use]
    pub const fn get(&self, modality: Modality) -> Threshold {
        match modality {
            Modality::Sparse => self.sparse,
            Modality::DenseText => self.dense_text,
            Modality::DenseCode => self.dense_code,
        }
    }
}

/// One hybrid retrieval request, scoped to a documentation version.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub version_scope: String,
    pub text_query: String,
    pub code_query: String,
    pub weights: ModalityWeights,
    pub top_k: usize,
    pub filter_expr: Option<String>,
    pub iterative_filter: bool,
    pub thresholds: ModalityThresholds,
}

impl HybridQuery {
    #[must_use]
    pub fn new(version_scope: impl Into<String>, text_query: impl Into<String>) -> Self {
        Self {
            version_scope: version_scope.into(),
            text_query: text_query.into(),
            code_query: String::new(),
            weights: ModalityWeights::default(),
            top_k: docqa_protocol::DEFAULT_TOP_K,
            filter_expr: None,
            iterative_filter: false,
            thresholds: ModalityThresholds::default(),
        }
    }

    /// Client-side checks; nothing here touches a backend.
    pub fn validate(&self) -> Result<()> {
        if self.version_scope.trim().is_empty() {
            return Err(SearchError::InvalidArgument(
                "version scope must not be empty".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "top_k must be positive".to_string(),
            ));
        }
        for modality in Modality::ALL {
            let weight = self.weights.get(modality);
            if !weight.is_finite() || weight < 0.0 {
                return Err(SearchError::InvalidArgument(format!(
                    "{} weight must be a non-negative number, got {weight}",
                    modality.as_str()
                )));
            }
        }
        if self.weights.active().next().is_none() {
            return Err(SearchError::InvalidArgument(
                "all modality weights are zero, nothing to search".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&SearchRequest> for HybridQuery {
    fn from(request: &SearchRequest) -> Self {
        Self {
            version_scope: request.version_name.clone(),
            text_query: request.text_query.clone(),
            code_query: request.code_query.clone(),
            weights: ModalityWeights::new(
                request.sparse_weight,
                request.dense_text_weight,
                request.dense_code_weight,
            ),
            top_k: request.top_k,
            filter_expr: request.filter_expr.clone(),
            iterative_filter: request.iterative_filter,
            thresholds: ModalityThresholds {
                sparse: Threshold {
                    radius: request.radius_sparse,
                    range: request.range_sparse,
                },
                dense_text: Threshold {
                    radius: request.radius_dense_text,
                    range: request.range_dense_text,
                },
                dense_code: Threshold {
                    radius: request.radius_dense_code,
                    range: request.range_dense_code,
                },
            },
        }
    }
}
