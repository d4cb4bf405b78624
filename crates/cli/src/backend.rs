use crate::config::AppConfig;
use anyhow::{Context, Result};
use docqa_search::HybridSearch;
use docqa_vector_store::{
    build_embedder, DocumentCorpus, InMemoryVectorStore, MilvusClient, VectorStore,
};
use std::path::Path;
use std::sync::Arc;

/// Build the search engine once per process: the embedder from config, and
/// either Milvus or an in-memory index over a local corpus file.
pub async fn connect(config: &AppConfig, corpus: Option<&Path>) -> Result<HybridSearch> {
    let mode = config.embedding_mode()?;
    let embedder = build_embedder(
        mode,
        &config.embedder.url,
        config.search.dense_dim,
        config.search.embed_timeout(),
    )?;

    let store: Arc<dyn VectorStore> = match corpus {
        Some(path) => {
            let corpus = DocumentCorpus::load(path)
                .await
                .with_context(|| format!("Failed to load corpus {}", path.display()))?;
            let indexed = corpus
                .index(embedder.as_ref(), &config.search.fields)
                .await
                .context("Failed to embed corpus")?;
            log::info!("Indexed {} documents in memory", indexed.len());
            Arc::new(InMemoryVectorStore::new(indexed))
        }
        None => {
            let client = MilvusClient::connect(config.milvus_config())
                .await
                .with_context(|| format!("Failed to connect to Milvus at {}", config.milvus.uri))?;
            Arc::new(client)
        }
    };

    Ok(HybridSearch::new(store, embedder, &config.search))
}
