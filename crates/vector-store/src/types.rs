use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar attributes stored next to every documentation chunk.
pub const DOCUMENT_OUTPUT_FIELDS: [&str; 6] = [
    "title",
    "metadata",
    "text_content",
    "code_content",
    "version",
    "tag",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAttributes {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub code_content: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tag: String,
}

impl DocumentAttributes {
    /// String attribute lookup used by predicate evaluation.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "text_content" => Some(&self.text_content),
            "code_content" => Some(&self.code_content),
            "version" => Some(&self.version),
            "tag" => Some(&self.tag),
            _ => None,
        }
    }
}

/// Term id -> weight mapping produced by a lexical encoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(pub BTreeMap<u32, f32>);

impl SparseVector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, term: u32, weight: f32) {
        self.0.insert(term, weight);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &f32)> {
        self.0.iter()
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f32 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .0
            .iter()
            .filter_map(|(term, w)| large.0.get(term).map(|v| w * v))
            .sum()
    }
}

impl FromIterator<(u32, f32)> for SparseVector {
    fn from_iter<I: IntoIterator<Item = (u32, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    InnerProduct,
    Cosine,
}

impl Metric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InnerProduct => "IP",
            Self::Cosine => "COSINE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Sparse(SparseVector),
    Dense(Vec<f32>),
}

/// Similarity gate and index tuning for one ANN call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Exclusive lower bound on the metric score.
    pub radius: f32,
    /// Inclusive upper bound on the metric score.
    pub range: f32,
    /// Number of IVF buckets to probe (dense fields only).
    pub nprobe: Option<u32>,
}

/// One nearest-neighbor query against a single vector field.
#[derive(Debug, Clone)]
pub struct AnnRequest {
    pub field: String,
    pub vector: QueryVector,
    pub metric: Metric,
    pub params: SearchParams,
    pub limit: usize,
    pub predicate: String,
    pub iterative_filter: bool,
}

/// A row returned by the backend, best-first within one call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub distance: f32,
    pub entity: DocumentAttributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_dot_only_counts_shared_terms() {
        let a: SparseVector = [(1, 0.5), (2, 1.0), (7, 2.0)].into_iter().collect();
        let b: SparseVector = [(2, 0.25), (7, 0.5)].into_iter().collect();
        assert!((a.dot(&b) - 1.25).abs() < 1e-6);
        assert!((b.dot(&a) - 1.25).abs() < 1e-6);
        assert_eq!(a.dot(&SparseVector::new()), 0.0);
    }

    #[test]
    fn sparse_vector_serializes_as_plain_map() {
        let v: SparseVector = [(3, 0.5)].into_iter().collect();
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!({"3": 0.5}));
    }

    #[test]
    fn attributes_tolerate_missing_fields() {
        let attrs: DocumentAttributes =
            serde_json::from_str(r#"{"title":"Routing","version":"v15.0.0"}"#).unwrap();
        assert_eq!(attrs.title, "Routing");
        assert_eq!(attrs.field("version"), Some("v15.0.0"));
        assert_eq!(attrs.field("metadata"), None);
        assert!(attrs.code_content.is_empty());
    }
}
