//! Semantic relevance ranking for aggregated news articles.
//!
//! Articles are embedded with a local sentence-embedding model and scored
//! against the query by cosine similarity. Article vectors are kept in a
//! persistent, checksummed cache so each article is embedded once.

pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod logging;
pub mod semantic;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{RankResult, SearchError};
pub use semantic::{EncoderHandle, SemanticSearch, VectorCacheStore};
pub use types::{Article, ArticleId, SearchRequest, SearchResponse, SearchResult};
