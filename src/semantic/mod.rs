//! Semantic ranking of news articles
//!
//! This module turns a query and an article pool into a relevance-ordered
//! result list, backed by a persistent vector cache so an article is
//! embedded at most once across requests and restarts.

mod cache;
mod encoder;
mod metadata;
mod ranker;
mod result_cache;
mod search;

pub use cache::{CacheLoad, CacheStats, VectorCacheStore};
pub use encoder::{EncoderHandle, TextEncoder};
pub use metadata::{CacheManifest, MANIFEST_FILE, get_utc_timestamp};
pub use ranker::{SimilarityRanker, score_against};
pub use result_cache::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL, ResultCache, ResultCacheStats,
};
pub use search::{SearchPath, SemanticSearch, deduplicate};

// Re-export key types
pub use fastembed::EmbeddingModel;

/// Similarity threshold recommendations for multilingual news embeddings
pub mod thresholds {
    /// Near-duplicate coverage of the same story
    pub const SAME_STORY: f32 = 0.75;

    /// Clearly on topic
    pub const RELEVANT: f32 = 0.50;

    /// Loosely related
    pub const RELATED: f32 = 0.30;

    /// Default floor: keep everything that is not anti-correlated
    pub const DEFAULT: f32 = 0.0;
}
