use crate::error::{Result, SearchError};
use docqa_vector_store::{CorpusFields, DEFAULT_DENSE_DIM};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning shared by every hybrid query served by one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Upper bound on a single modality's backend call.
    pub modality_timeout_ms: u64,
    /// Upper bound on the query encoding call.
    pub embed_timeout_ms: u64,
    /// IVF probe count sent with dense searches.
    pub nprobe: u32,
    /// Expected dense embedding width.
    pub dense_dim: usize,
    pub fields: CorpusFields,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            modality_timeout_ms: 10_000,
            embed_timeout_ms: 30_000,
            nprobe: 10,
            dense_dim: DEFAULT_DENSE_DIM,
            fields: CorpusFields::default(),
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.modality_timeout_ms == 0 {
            return Err(SearchError::Config(
                "modality_timeout_ms must be positive".to_string(),
            ));
        }
        if self.embed_timeout_ms == 0 {
            return Err(SearchError::Config(
                "embed_timeout_ms must be positive".to_string(),
            ));
        }
        if self.dense_dim == 0 {
            return Err(SearchError::Config("dense_dim must be positive".to_string()));
        }
        let names = [
            &self.fields.sparse_title,
            &self.fields.dense_text,
            &self.fields.dense_code,
        ];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(SearchError::Config(
                "vector field names must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn modality_timeout(&self) -> Duration {
        Duration::from_millis(self.modality_timeout_ms)
    }

    #[must_use]
    pub const fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: SearchConfig = toml::from_str(
            r#"
            nprobe = 16
            [fields]
            dense_code = "dense_code_v2"
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.nprobe, 16);
        assert_eq!(cfg.fields.dense_code, "dense_code_v2");
        assert_eq!(cfg.fields.sparse_title, "sparse_title");
        assert_eq!(cfg.modality_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let cfg: SearchConfig = toml::from_str("modality_timeout_ms = 0").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
