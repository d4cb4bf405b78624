//! # Docs QA Vector Store
//!
//! Backend seams for hybrid documentation retrieval.
//!
//! ## Features
//!
//! - **`VectorStore` trait**: one nearest-neighbor query per call, shared across tasks
//! - **Milvus REST adapter** with collection load/reload lifecycle
//! - **In-memory brute-force store** for offline runs and tests
//! - **Embedders**: HTTP (BGE-M3 style dense + lexical output) and a deterministic stub
//!
//! ## Architecture
//!
//! ```text
//! query text ──> Embedder ──> { dense[1024], sparse{term: w} }
//!                                   │
//!                                   ▼
//!                    AnnRequest (field, metric, radius/range, predicate)
//!                                   │
//!                     ┌─────────────┴─────────────┐
//!                     ▼                           ▼
//!               MilvusClient              InMemoryVectorStore
//! ```

mod corpus;
mod embeddings;
mod error;
mod memory;
mod milvus;
mod predicate;
mod store;
mod types;

pub use corpus::{CorpusDocument, CorpusFields, DocumentCorpus, IndexedDocument};
pub use embeddings::{
    build_embedder, cosine_similarity, Embedder, EmbeddingMode, Encoded, HttpEmbedder,
    StubEmbedder, DEFAULT_DENSE_DIM,
};
pub use error::{Result, VectorStoreError};
pub use memory::InMemoryVectorStore;
pub use milvus::{MilvusClient, MilvusConfig};
pub use predicate::Predicate;
pub use store::VectorStore;
pub use types::{
    AnnRequest, DocumentAttributes, Metric, QueryVector, SearchParams, SparseVector, StoreHit,
    DOCUMENT_OUTPUT_FIELDS,
};
