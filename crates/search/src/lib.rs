//! Hybrid multi-modal retrieval for versioned documentation.
//!
//! A query fans out to three nearest-neighbor searches (sparse title terms,
//! dense prose, dense code) scoped to one documentation version. The
//! per-modality hit lists are merged by document id and fused into a single
//! ranking with weighted, coverage-renormalized scores.
//!
//! ```text
//! HybridQuery ─► QueryEmbedder ─► ModalitySearchClient ×3 ─► merge ─► rank
//! ```

mod config;
mod embedding;
mod error;
mod filter;
mod fusion;
mod hybrid;
mod modality;
mod normalize;
mod prompt;
mod query;

pub use config::SearchConfig;
pub use embedding::{QueryEmbedder, QueryEmbedding};
pub use error::{Result, SearchError};
pub use filter::{compose_filter, version_predicate};
pub use fusion::{merge, rank, score, MergedCandidate, RankedResult};
pub use hybrid::HybridSearch;
pub use modality::{Modality, ModalityHit, ModalityOutcome, ModalityRequest, ModalitySearchClient};
pub use normalize::normalize_distance;
pub use prompt::{
    build_prompt_context, inline_files, render_chunk, render_context, split_text_and_code,
    SplitQuery, SupportedVersions,
};
pub use query::{HybridQuery, ModalityThresholds, ModalityWeights, Threshold};
