use anyhow::{Context, Result};
use docqa_search::SearchConfig;
use docqa_vector_store::{EmbeddingMode, MilvusConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "docqa.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilvusSection {
    pub uri: String,
    pub token: Option<String>,
    pub db_name: Option<String>,
    pub collection: String,
    pub request_timeout_ms: u64,
}

impl Default for MilvusSection {
    fn default() -> Self {
        Self {
            uri: "http://standalone:19530".to_string(),
            token: None,
            db_name: None,
            collection: "nextjs_docs".to_string(),
            request_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderSection {
    pub url: String,
    /// `http` or `stub`.
    pub mode: String,
}

impl Default for EmbedderSection {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            mode: EmbeddingMode::Http.as_str().to_string(),
        }
    }
}

/// Process configuration: `docqa.toml` first, environment on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub milvus: MilvusSection,
    pub embedder: EmbedderSection,
    pub supported_versions_file: PathBuf,
    pub search: SearchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            milvus: MilvusSection::default(),
            embedder: EmbedderSection::default(),
            supported_versions_file: PathBuf::from("config/supported_versions.txt"),
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (which must exist), or from `docqa.toml` in the
    /// working directory when present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = non_empty("MILVUS_URI") {
            self.milvus.uri = uri;
        }
        if let Some(token) = non_empty("MILVUS_TOKEN") {
            self.milvus.token = Some(token);
        }
        if let Some(collection) = non_empty("DOCQA_COLLECTION") {
            self.milvus.collection = collection;
        }
        if let Some(url) = non_empty("EMBEDDER_URL") {
            self.embedder.url = url;
        }
        if let Some(mode) = non_empty("DOCQA_EMBEDDING_MODE") {
            self.embedder.mode = mode.to_ascii_lowercase();
        }
        if let Some(file) = non_empty("SUPPORTED_VERSIONS_FILE") {
            self.supported_versions_file = PathBuf::from(file);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.embedding_mode()?;
        if self.milvus.collection.trim().is_empty() {
            anyhow::bail!("milvus.collection must not be empty");
        }
        Ok(())
    }

    pub fn embedding_mode(&self) -> Result<EmbeddingMode> {
        Ok(EmbeddingMode::parse(&self.embedder.mode)?)
    }

    #[must_use]
    pub fn milvus_config(&self) -> MilvusConfig {
        MilvusConfig {
            uri: self.milvus.uri.clone(),
            token: self.milvus.token.clone(),
            db_name: self.milvus.db_name.clone(),
            collection: self.milvus.collection.clone(),
            request_timeout: Duration::from_millis(self.milvus.request_timeout_ms),
        }
    }
}
