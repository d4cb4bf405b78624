use crate::embeddings::Embedder;
use crate::error::{Result, VectorStoreError};
use crate::types::{DocumentAttributes, QueryVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const EMBED_BATCH: usize = 64;

/// Vector field names of the documentation collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusFields {
    pub sparse_title: String,
    pub dense_text: String,
    pub dense_code: String,
}

impl Default for CorpusFields {
    fn default() -> Self {
        Self {
            sparse_title: "sparse_title".to_string(),
            dense_text: "dense_text_content".to_string(),
            dense_code: "dense_code_snippet".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub attributes: DocumentAttributes,
}

/// A document together with its per-field vectors.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub id: String,
    pub entity: DocumentAttributes,
    pub vectors: HashMap<String, QueryVector>,
}

/// Documentation chunks read from a local JSON array or JSONL file.
#[derive(Debug, Clone, Default)]
pub struct DocumentCorpus {
    documents: Vec<CorpusDocument>,
}

impl DocumentCorpus {
    #[must_use]
    pub fn new(documents: Vec<CorpusDocument>) -> Self {
        Self { documents }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let documents = Self::parse(&raw)?;
        log::info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(Self { documents })
    }

    fn parse(raw: &str) -> Result<Vec<CorpusDocument>> {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('[') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embed titles (lexical), text and code (dense) the way the collection
    /// was originally populated.
    pub async fn index(
        self,
        embedder: &dyn Embedder,
        fields: &CorpusFields,
    ) -> Result<Vec<IndexedDocument>> {
        let mut indexed = Vec::with_capacity(self.documents.len());

        for (batch_idx, batch) in self.documents.chunks(EMBED_BATCH).enumerate() {
            let titles: Vec<String> = batch.iter().map(|d| d.attributes.title.clone()).collect();
            let texts: Vec<String> = batch
                .iter()
                .map(|d| d.attributes.text_content.clone())
                .collect();
            let codes: Vec<String> = batch
                .iter()
                .map(|d| d.attributes.code_content.clone())
                .collect();

            let title_enc = embedder.encode(&titles).await?;
            let text_enc = embedder.encode(&texts).await?;
            let code_enc = embedder.encode(&codes).await?;
            if title_enc.len() != batch.len()
                || text_enc.len() != batch.len()
                || code_enc.len() != batch.len()
            {
                return Err(VectorStoreError::EmbeddingError(
                    "Encoder output does not match corpus batch size".to_string(),
                ));
            }

            let encoded = title_enc.into_iter().zip(text_enc).zip(code_enc);
            for (offset, (doc, ((title, text), code))) in batch.iter().zip(encoded).enumerate() {
                let id = doc
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("doc-{}", batch_idx * EMBED_BATCH + offset));
                let mut vectors = HashMap::new();
                vectors.insert(fields.sparse_title.clone(), QueryVector::Sparse(title.sparse));
                vectors.insert(fields.dense_text.clone(), QueryVector::Dense(text.dense));
                vectors.insert(fields.dense_code.clone(), QueryVector::Dense(code.dense));
                indexed.push(IndexedDocument {
                    id,
                    entity: doc.attributes.clone(),
                    vectors,
                });
            }
        }

        Ok(indexed)
    }
}
