//! Search orchestration: dedup, cache sync, candidate retrieval, ranking.
//!
//! One request runs synchronously through
//! `Idle → Deduplicating → Syncing → Querying → Ranking → Done`, with
//! `Error` reachable from any step. When a vector cache store is present
//! candidates come from it; otherwise the pool is scanned chunk by chunk.
//! The two paths are never mixed within a request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{RankResult, SearchError};
use crate::semantic::cache::{CacheLoad, VectorCacheStore};
use crate::semantic::encoder::{EncoderHandle, TextEncoder};
use crate::semantic::ranker::{SimilarityRanker, score_against};
use crate::semantic::result_cache::ResultCache;
use crate::types::{Article, ArticleId, SearchRequest, SearchResponse, SearchResult, ValidSearch};

/// Where candidates for a request come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    /// Persistent vector cache, synced with the pool first.
    Cache,
    /// Chunked linear scan over the pool, encoding every article.
    Scan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    Idle,
    Deduplicating,
    Syncing,
    Querying,
    Ranking,
    Done,
    Error,
}

/// Collapse a raw pool by article id, first occurrence wins.
///
/// Missing ids are computed from `url` and `title` first.
pub fn deduplicate(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::with_capacity(articles.len());
    articles
        .into_iter()
        .map(|mut article| {
            article.ensure_id();
            article
        })
        .filter(|article| seen.insert(article.id.clone()))
        .collect()
}

/// Ranks article pools against free-text queries.
///
/// The encoder and the optional store are created once per process and
/// shared by every request.
pub struct SemanticSearch {
    encoder: EncoderHandle,
    store: Option<Arc<RwLock<VectorCacheStore>>>,
    /// Held across encode + add + persist so concurrent requests never
    /// encode or append the same article twice.
    sync_lock: Mutex<()>,
    result_cache: Option<ResultCache>,
}

impl std::fmt::Debug for SemanticSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticSearch")
            .field("encoder", &self.encoder)
            .field("path", &self.path())
            .field("result_cache", &self.result_cache.is_some())
            .finish()
    }
}

impl SemanticSearch {
    /// Orchestrator without a store or result cache (scan path).
    pub fn new(encoder: EncoderHandle) -> Self {
        Self {
            encoder,
            store: None,
            sync_lock: Mutex::new(()),
            result_cache: None,
        }
    }

    /// Take ownership of `store`; this orchestrator's sync lock is the
    /// only writer lock it will ever see.
    #[must_use]
    pub fn with_store(mut self, store: VectorCacheStore) -> Self {
        self.store = Some(Arc::new(RwLock::new(store)));
        self
    }

    #[must_use]
    pub fn with_result_cache(mut self, cache: ResultCache) -> Self {
        self.result_cache = Some(cache);
        self
    }

    /// Build the process-wide orchestrator from settings.
    ///
    /// Loads the model once, then opens and loads the vector cache. A store
    /// that cannot be opened degrades to the scan path.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut semantic = settings.semantic.clone();
        semantic.model_cache_dir = settings.model_cache_dir();
        let mut search = Self::new(EncoderHandle::load(&semantic));

        let store_target = match search.encoder.encoder() {
            Ok(encoder) if semantic.cache_enabled => {
                Some((encoder.model_name().to_string(), encoder.dimension()))
            }
            _ => None,
        };
        if let Some((model_name, dimension)) = store_target {
            match VectorCacheStore::open(settings.cache_dir(), model_name, dimension) {
                Ok(mut store) => {
                    if let CacheLoad::Corrupt { reason } = store.load() {
                        debug!("Vector cache starts empty: {reason}");
                    }
                    search = search.with_store(store);
                }
                Err(e) => warn!("Vector cache unavailable, falling back to linear scan: {e}"),
            }
        }

        if settings.result_cache.enabled {
            search = search.with_result_cache(ResultCache::new(
                Duration::from_secs(settings.result_cache.ttl_secs),
                Duration::from_secs(settings.result_cache.cleanup_interval_secs),
            ));
        }

        search
    }

    /// Whether the embedding model loaded.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.encoder.is_available()
    }

    pub fn encoder(&self) -> &EncoderHandle {
        &self.encoder
    }

    pub fn store(&self) -> Option<&Arc<RwLock<VectorCacheStore>>> {
        self.store.as_ref()
    }

    pub fn result_cache(&self) -> Option<&ResultCache> {
        self.result_cache.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> SearchPath {
        if self.store.is_some() {
            SearchPath::Cache
        } else {
            SearchPath::Scan
        }
    }

    /// Rank `articles` against the request query.
    ///
    /// # Errors
    /// - `InvalidRequest` before any model or cache work
    /// - `EncodingUnavailable` when the model never loaded
    /// - `EncodingFailure` when the query cannot be encoded
    /// - `Storage` when new vectors cannot be persisted (the store is
    ///   rolled back to its last commit)
    pub fn search(
        &self,
        request: &SearchRequest,
        articles: Vec<Article>,
    ) -> RankResult<SearchResponse> {
        let search = request.validated()?;
        let encoder = self.encoder.encoder()?;

        let mut state = SearchState::Idle;
        let result = self.run(encoder, &search, articles, &mut state);
        if let Err(e) = &result {
            transition(&mut state, SearchState::Error, &search.query);
            debug!(query = %search.query, "search failed: {e}");
        }
        result
    }

    fn run(
        &self,
        encoder: &TextEncoder,
        search: &ValidSearch,
        articles: Vec<Article>,
        state: &mut SearchState,
    ) -> RankResult<SearchResponse> {
        transition(state, SearchState::Deduplicating, &search.query);
        let raw_count = articles.len();
        let pool = deduplicate(articles);
        debug!(
            query = %search.query,
            "deduplicated {raw_count} articles to {}",
            pool.len()
        );
        let ids: Vec<ArticleId> = pool.iter().map(|a| a.id.clone()).collect();

        let cache_key = self
            .result_cache
            .as_ref()
            .map(|_| ResultCache::key(search, &ids));
        if let (Some(cache), Some(key)) = (&self.result_cache, &cache_key) {
            if let Some(response) = cache.get(key) {
                transition(state, SearchState::Done, &search.query);
                return Ok(response);
            }
        }

        let ranker = SimilarityRanker::new(search.min_similarity, search.num);
        let mut skipped_batches = 0;
        let scored: Vec<(usize, f32)> = match &self.store {
            Some(store) => {
                transition(state, SearchState::Syncing, &search.query);
                skipped_batches = self.sync_cache(encoder, store, &pool, search.chunk_size)?;

                transition(state, SearchState::Querying, &search.query);
                let query = encoder.encode_one(&search.query)?;
                let candidates = store
                    .read()
                    .search_among(&query, &ids, search.candidate_k())?;

                let positions: HashMap<&ArticleId, usize> =
                    ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
                candidates
                    .into_iter()
                    .filter_map(|(id, score)| positions.get(&id).map(|&i| (i, score)))
                    .collect()
            }
            None => {
                transition(state, SearchState::Querying, &search.query);
                let query = encoder.encode_one(&search.query)?;
                let (accepted, skipped) = scan_pool(encoder, &pool, search, &query, &ranker);
                skipped_batches = skipped;
                accepted
            }
        };

        transition(state, SearchState::Ranking, &search.query);
        let results: Vec<SearchResult> = ranker
            .rank(scored)
            .into_iter()
            .map(|(i, similarity_score)| SearchResult {
                article: pool[i].clone(),
                similarity_score,
            })
            .collect();
        let response = SearchResponse::new(search.query.clone(), results);

        // Partial answers are not reused; a retry gets to encode the skipped batches
        match (&self.result_cache, cache_key) {
            (Some(cache), Some(key)) if skipped_batches == 0 => {
                cache.insert(key, response.clone());
            }
            (Some(_), Some(_)) => debug!(
                query = %search.query,
                "not caching response, {skipped_batches} batch(es) skipped"
            ),
            _ => {}
        }
        transition(state, SearchState::Done, &search.query);
        Ok(response)
    }

    /// Encode pool articles missing from the store, append and persist them.
    ///
    /// Returns the number of batches that failed to encode and were skipped.
    fn sync_cache(
        &self,
        encoder: &TextEncoder,
        store: &RwLock<VectorCacheStore>,
        pool: &[Article],
        chunk_size: usize,
    ) -> RankResult<usize> {
        let _guard = self.sync_lock.lock();

        let fresh: Vec<&Article> = {
            let store = store.read();
            pool.iter().filter(|a| !store.contains(&a.id)).collect()
        };
        if fresh.is_empty() {
            debug!("All {} articles already cached", pool.len());
            return Ok(0);
        }

        let mut skipped = 0;
        let mut entries = Vec::with_capacity(fresh.len());
        for (batch, chunk) in fresh.chunks(chunk_size).enumerate() {
            let texts: Vec<String> = chunk.iter().map(|a| a.embedding_text()).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            match encoder.encode_many(&refs) {
                Ok(vectors) => {
                    entries.extend(chunk.iter().map(|a| a.id.clone()).zip(vectors));
                    debug!("Encoded batch {batch} ({} articles)", chunk.len());
                }
                Err(e) => {
                    warn!("Skipping batch {batch} of {} articles: {e}", chunk.len());
                    skipped += 1;
                }
            }
        }

        let mut store = store.write();
        let appended = store.add(entries)?;
        if let Err(e) = store.persist() {
            store.rollback();
            return Err(e);
        }
        info!("Cached {appended} new article vectors ({} total)", store.len());
        Ok(skipped)
    }

    /// Raw nearest neighbours of `query` over the whole store.
    pub fn nearest(&self, query: &str, k: usize) -> RankResult<Vec<(ArticleId, f32)>> {
        let store = self.store.as_ref().ok_or_else(|| SearchError::Storage {
            message: "Vector cache is disabled".to_string(),
            suggestion: "Set semantic.cache_enabled = true in .newsrank/settings.toml".to_string(),
        })?;
        let vector = self.encoder.encode_one(query.trim())?;
        store.read().search(&vector, k)
    }

    /// Drop every cached vector and response.
    pub fn clear_caches(&self) -> RankResult<()> {
        if let Some(cache) = &self.result_cache {
            cache.clear();
        }
        match &self.store {
            Some(store) => {
                let _guard = self.sync_lock.lock();
                store.write().reset()
            }
            None => Ok(()),
        }
    }
}

/// Chunked linear scan used when no store is configured.
///
/// Stops after the chunk in which the accepted count reaches the early-stop
/// threshold, so later chunks are never scored even if they hold better
/// matches. Returns `(pool index, score)` for accepted articles and the
/// number of chunks skipped after an encoding failure.
fn scan_pool(
    encoder: &TextEncoder,
    pool: &[Article],
    search: &ValidSearch,
    query: &[f32],
    ranker: &SimilarityRanker,
) -> (Vec<(usize, f32)>, usize) {
    let early_stop = search.effective_early_stop();
    let mut accepted = Vec::new();
    let mut skipped = 0;

    for (index, chunk) in pool.chunks(search.chunk_size).enumerate() {
        let texts: Vec<String> = chunk.iter().map(Article::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = match encoder.encode_many(&refs) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Skipping chunk {index} of {} articles: {e}", chunk.len());
                skipped += 1;
                continue;
            }
        };

        let offset = index * search.chunk_size;
        accepted.extend(
            score_against(query, &vectors)
                .into_iter()
                .enumerate()
                .filter(|(_, score)| ranker.accepts(*score))
                .map(|(i, score)| (offset + i, score)),
        );

        if early_stop.is_some_and(|threshold| accepted.len() >= threshold) {
            debug!(
                "Early stop after chunk {index}: {} accepted of {} articles",
                accepted.len(),
                pool.len()
            );
            break;
        }
    }
    (accepted, skipped)
}

fn transition(state: &mut SearchState, next: SearchState, query: &str) {
    debug!(query, "search state {:?} -> {:?}", *state, next);
    *state = next;
}
