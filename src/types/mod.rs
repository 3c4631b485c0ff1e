//! Data model shared by the ranking pipeline: articles, requests, results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{RankResult, SearchError};
use crate::vector::create_article_text;

/// Longest accepted query, in characters after trimming.
pub const MAX_QUERY_CHARS: usize = 200;

/// Upper bound for `num`.
pub const MAX_NUM: usize = 500;

/// Accepted range for `chunk_size`.
pub const MIN_CHUNK_SIZE: usize = 10;
pub const MAX_CHUNK_SIZE: usize = 500;

pub const DEFAULT_NUM: usize = 100;
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Hex characters kept from the content hash.
const ARTICLE_ID_LEN: usize = 24;

/// Over-fetch factor applied to `num` when a similarity floor is set.
const CANDIDATE_MULTIPLIER: usize = 3;

/// Stable article identifier derived from its content.
///
/// The same `url` and `title` always hash to the same id, whichever
/// provider delivered the article. It is the dedup and cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    /// Hash `url|title` and keep the first 24 hex characters.
    #[must_use]
    pub fn from_content(url: &str, title: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"|");
        hasher.update(title.as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        Self(hex[..ARTICLE_ID_LEN].to_string())
    }

    /// Wrap an id that was computed elsewhere (for example, loaded from disk).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A news article as delivered by an upstream provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Computed by [`Article::ensure_id`] when a provider leaves it out.
    #[serde(default)]
    pub id: ArticleId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        let title = title.into();
        let url = url.into();
        Self {
            id: ArticleId::from_content(&url, &title),
            title,
            url,
            source: source.into(),
            published_at: None,
            snippet: None,
            thumbnail: None,
        }
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    #[must_use]
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Fill in the content-hash id if the provider did not supply one.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = ArticleId::from_content(&self.url, &self.title);
        }
    }

    /// Text fed to the embedding model for this article.
    pub fn embedding_text(&self) -> String {
        create_article_text(&self.title, self.snippet.as_deref())
    }
}

fn default_num() -> usize {
    DEFAULT_NUM
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Parameters of one semantic search, as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub q: String,
    #[serde(default = "default_num")]
    pub num: usize,
    #[serde(default)]
    pub min_similarity: f32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub early_stop_threshold: Option<usize>,
}

impl SearchRequest {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            num: DEFAULT_NUM,
            min_similarity: 0.0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            early_stop_threshold: None,
        }
    }

    #[must_use]
    pub fn with_num(mut self, num: usize) -> Self {
        self.num = num;
        self
    }

    #[must_use]
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_early_stop(mut self, threshold: usize) -> Self {
        self.early_stop_threshold = Some(threshold);
        self
    }

    /// Check every bound and return the normalized request.
    ///
    /// # Errors
    /// Returns [`SearchError::InvalidRequest`] naming the first offending field.
    pub fn validated(&self) -> RankResult<ValidSearch> {
        let query = self.q.trim();
        let chars = query.chars().count();
        if chars == 0 {
            return Err(SearchError::invalid("query must not be empty"));
        }
        if chars > MAX_QUERY_CHARS {
            return Err(SearchError::invalid(format!(
                "query is {chars} characters, the limit is {MAX_QUERY_CHARS}"
            )));
        }
        if !(1..=MAX_NUM).contains(&self.num) {
            return Err(SearchError::invalid(format!(
                "num must be between 1 and {MAX_NUM}, got {}",
                self.num
            )));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(SearchError::invalid(format!(
                "min_similarity must be within [0, 1], got {}",
                self.min_similarity
            )));
        }
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(SearchError::invalid(format!(
                "chunk_size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.early_stop_threshold == Some(0) {
            return Err(SearchError::invalid(
                "early_stop_threshold must be at least 1 when set",
            ));
        }

        Ok(ValidSearch {
            query: query.to_string(),
            num: self.num,
            min_similarity: self.min_similarity,
            chunk_size: self.chunk_size,
            early_stop_threshold: self.early_stop_threshold,
        })
    }
}

/// A [`SearchRequest`] that passed validation, with the query trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSearch {
    pub query: String,
    pub num: usize,
    pub min_similarity: f32,
    pub chunk_size: usize,
    pub early_stop_threshold: Option<usize>,
}

impl ValidSearch {
    /// How many candidates to pull from the vector cache.
    ///
    /// With a similarity floor some candidates will be dropped, so fetch
    /// three times as many as will be returned.
    #[must_use]
    pub fn candidate_k(&self) -> usize {
        if self.min_similarity > 0.0 {
            self.num * CANDIDATE_MULTIPLIER
        } else {
            self.num
        }
    }

    /// Accepted-result count at which the fallback scan stops, if any.
    #[must_use]
    pub fn effective_early_stop(&self) -> Option<usize> {
        self.early_stop_threshold.or_else(|| {
            (self.min_similarity > 0.0).then_some(self.num * CANDIDATE_MULTIPLIER)
        })
    }
}

/// An article with its relevance score attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub article: Article,
    pub similarity_score: f32,
}

/// Ranked answer to a [`SearchRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub articles: Vec<SearchResult>,
    pub total: usize,
    pub query: String,
}

impl SearchResponse {
    pub fn new(query: impl Into<String>, articles: Vec<SearchResult>) -> Self {
        Self {
            total: articles.len(),
            articles,
            query: query.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}
