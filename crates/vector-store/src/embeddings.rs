use crate::error::{Result, VectorStoreError};
use crate::types::SparseVector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Dense width of the BGE-M3 family the corpus was indexed with.
pub const DEFAULT_DENSE_DIM: usize = 1024;

/// Dense + lexical representation of one input string.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
}

/// Query encoder backing the retrieval layer.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Encode every text; the output is index-aligned with the input.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Encoded>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmbeddingMode {
    Http,
    Stub,
}

impl EmbeddingMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::EmbeddingError(format!(
                "Unsupported DOCQA_EMBEDDING_MODE '{other}' (expected 'http' or 'stub')"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Stub => "stub",
        }
    }
}

/// Build the process-wide embedder for the selected mode.
pub fn build_embedder(
    mode: EmbeddingMode,
    base_url: &str,
    dimension: usize,
    timeout: Duration,
) -> Result<Arc<dyn Embedder>> {
    log::info!(
        "Using {} embedder (dimension {dimension})",
        mode.as_str()
    );
    match mode {
        EmbeddingMode::Stub => Ok(Arc::new(StubEmbedder::new(dimension))),
        EmbeddingMode::Http => Ok(Arc::new(HttpEmbedder::new(base_url, dimension, timeout)?)),
    }
}

#[derive(Serialize)]
struct EncodeRequest<'a> {
    texts: &'a [String],
    return_dense: bool,
    return_sparse: bool,
}

#[derive(Deserialize)]
struct EncodeResponse {
    dense_vecs: Vec<Vec<f32>>,
    #[serde(default)]
    lexical_weights: Vec<BTreeMap<String, f32>>,
}

/// Client for an HTTP encoding service exposing BGE-M3 style output
/// (`dense_vecs` + `lexical_weights`).
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/encode", base_url.trim_end_matches('/')),
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Encoded>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EncodeRequest {
                texts,
                return_dense: true,
                return_sparse: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::EmbeddingError(format!(
                "Encoder returned {status}: {body}"
            )));
        }

        let parsed: EncodeResponse = response.json().await?;
        if parsed.dense_vecs.len() != texts.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Encoder returned {} dense vectors for {} inputs",
                parsed.dense_vecs.len(),
                texts.len()
            )));
        }

        let mut lexical = parsed.lexical_weights.into_iter();
        parsed
            .dense_vecs
            .into_iter()
            .map(|dense| {
                ensure_dimension(&dense, self.dimension)?;
                let sparse = match lexical.next() {
                    Some(weights) => parse_lexical_weights(weights)?,
                    None => SparseVector::new(),
                };
                Ok(Encoded { dense, sparse })
            })
            .collect()
    }
}

fn parse_lexical_weights(weights: BTreeMap<String, f32>) -> Result<SparseVector> {
    weights
        .into_iter()
        .map(|(term, weight)| {
            term.parse::<u32>()
                .map(|id| (id, weight))
                .map_err(|_| {
                    VectorStoreError::EmbeddingError(format!("Non-numeric lexical term id '{term}'"))
                })
        })
        .collect()
}

pub(crate) fn ensure_dimension(vec: &[f32], expected: usize) -> Result<()> {
    if vec.len() != expected {
        return Err(VectorStoreError::InvalidDimension {
            expected,
            actual: vec.len(),
        });
    }
    Ok(())
}

/// Deterministic offline encoder: hashed bag-of-tokens for both the dense and
/// the lexical side, so overlapping texts score above unrelated ones.
#[derive(Clone)]
pub struct StubEmbedder {
    dimension: usize,
    calls: Arc<AtomicUsize>,
}

impl StubEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `encode` invocations so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn encode_one(&self, text: &str) -> Encoded {
        let tokens = tokenize(text);
        Encoded {
            dense: stub_dense(&tokens, self.dimension),
            sparse: stub_sparse(&tokens),
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Encoded>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(texts.iter().map(|text| self.encode_one(text)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn stub_sparse(tokens: &[String]) -> SparseVector {
    let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
    for token in tokens {
        // Keep ids inside a BGE-M3 sized vocabulary.
        let id = (fnv1a_64(token.as_bytes()) % 250_002) as u32;
        *counts.entry(id).or_insert(0.0) += 1.0;
    }
    let norm = counts.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for weight in counts.values_mut() {
            *weight /= norm;
        }
    }
    SparseVector(counts)
}

fn stub_dense(tokens: &[String], dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimension];
    for token in tokens {
        let mut state =
            fnv1a_64(token.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        for slot in &mut vec {
            let bits = splitmix64(&mut state);
            let high = (bits >> 32) as u32;
            let mantissa = high >> 9;
            let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
            *slot += unit.mul_add(2.0, -1.0);
        }
    }
    normalize(&mut vec);
    vec
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_is_deterministic_and_counts_calls() {
        let embedder = StubEmbedder::new(32);
        let texts = vec!["app router layouts".to_string(), "fn main() {}".to_string()];
        let first = embedder.encode(&texts).await.unwrap();
        let second = embedder.encode(&texts).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].dense.len(), 32);
        assert_eq!(embedder.calls(), 2);
    }

    #[test]
    fn stub_similarity_tracks_token_overlap() {
        let embedder = StubEmbedder::new(64);
        let a = embedder.encode_one("dynamic routes params");
        let b = embedder.encode_one("Dynamic Routes");
        let c = embedder.encode_one("image optimization");

        let same = cosine_similarity(&a.dense, &a.dense);
        assert!((same - 1.0).abs() < 1e-5);
        assert!(a.sparse.dot(&b.sparse) > a.sparse.dot(&c.sparse));
        assert!((a.sparse.dot(&a.sparse) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_yields_zero_vectors() {
        let embedder = StubEmbedder::new(8);
        let encoded = embedder.encode_one("   ");
        assert!(encoded.sparse.is_empty());
        assert!(encoded.dense.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn lexical_weights_require_numeric_ids() {
        let mut ok = BTreeMap::new();
        ok.insert("42".to_string(), 0.3);
        let parsed = parse_lexical_weights(ok).unwrap();
        assert_eq!(parsed.len(), 1);

        let mut bad = BTreeMap::new();
        bad.insert("token".to_string(), 0.3);
        assert!(matches!(
            parse_lexical_weights(bad),
            Err(VectorStoreError::EmbeddingError(_))
        ));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(EmbeddingMode::parse("stub").unwrap(), EmbeddingMode::Stub);
        assert_eq!(EmbeddingMode::parse(" HTTP ").unwrap(), EmbeddingMode::Http);
        assert!(EmbeddingMode::parse("onnx").is_err());
    }

    #[test]
    fn dimension_check() {
        assert!(ensure_dimension(&[0.0; 4], 4).is_ok());
        assert!(matches!(
            ensure_dimension(&[0.0; 3], 4),
            Err(VectorStoreError::InvalidDimension {
                expected: 4,
                actual: 3
            })
        ));
    }
}
