//! Vector cache reuse across orchestrators and recovery from damaged files.

use std::path::Path;
use std::sync::Arc;

use newsrank::semantic::{CacheLoad, MANIFEST_FILE};
use newsrank::vector::VectorDimension;
use newsrank::{Article, EncoderHandle, SearchRequest, SemanticSearch, VectorCacheStore};
use tempfile::TempDir;

use crate::support::{FixedGenerator, article};

const MODEL: &str = "fixed-test-model";

fn five_articles() -> (Arc<FixedGenerator>, Vec<Article>) {
    let generator = FixedGenerator::new(3)
        .with("markets", &[1.0, 0.0, 0.0])
        .with("rates", &[0.9, 0.1, 0.0])
        .with("bonds", &[0.7, 0.3, 0.0])
        .with("league", &[0.0, 1.0, 0.0])
        .with("storm", &[0.0, 0.0, 1.0])
        .with("cup", &[0.0, 0.9, 0.1]);
    let articles = ["markets", "rates", "bonds", "league", "storm"]
        .iter()
        .map(|t| article(t, &format!("https://news.example/{t}")))
        .collect();
    (Arc::new(generator), articles)
}

fn open_search(dir: &Path, generator: Arc<FixedGenerator>) -> SemanticSearch {
    let mut store = VectorCacheStore::open(dir, MODEL, VectorDimension::new(3).unwrap()).unwrap();
    store.load();
    SemanticSearch::new(EncoderHandle::from_generator(generator)).with_store(store)
}

#[test]
fn test_second_run_encodes_only_the_query() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    let request = SearchRequest::new("markets").with_num(3);

    let first = open_search(dir.path(), generator.clone())
        .search(&request, articles.clone())
        .unwrap();
    assert_eq!(generator.texts(), 6);

    // Fresh orchestrator reading the persisted cache
    let second = open_search(dir.path(), generator.clone())
        .search(&request, articles)
        .unwrap();
    assert_eq!(generator.texts(), 7);

    assert_eq!(first.articles, second.articles);
    assert_eq!(second.articles[0].article.title, "markets");
}

#[test]
fn test_concurrent_searches_encode_each_article_once() {
    const THREADS: usize = 4;
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    let search = open_search(dir.path(), generator.clone());
    let request = SearchRequest::new("markets").with_num(3);

    let responses: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(|| search.search(&request, articles.clone()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Every article once, plus one query per thread
    assert_eq!(generator.texts(), articles.len() + THREADS);
    assert!(
        responses
            .iter()
            .all(|r| r.articles[0].article.title == "markets")
    );

    let store = search.store().unwrap().read();
    assert_eq!(store.len(), articles.len());
    assert!(!store.is_dirty());
}

#[test]
fn test_only_new_articles_are_encoded() {
    let dir = TempDir::new().unwrap();
    let (generator, mut articles) = five_articles();
    let search = open_search(dir.path(), generator.clone());
    let request = SearchRequest::new("league");

    search.search(&request, articles.clone()).unwrap();
    let before = generator.texts();

    articles.push(article("cup", "https://news.example/cup"));
    let response = search.search(&request, articles).unwrap();

    // One new article plus the query
    assert_eq!(generator.texts() - before, 2);
    assert_eq!(response.articles[0].article.title, "league");
    assert_eq!(response.articles[1].article.title, "cup");

    let store = search.store().unwrap().read();
    assert_eq!(store.len(), 6);
    assert!(!store.is_dirty());
}

#[test]
fn test_results_stay_within_the_request_pool() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    let search = open_search(dir.path(), generator);

    search
        .search(&SearchRequest::new("markets"), articles.clone())
        .unwrap();

    // "markets" is cached but not part of this pool
    let pool: Vec<Article> = articles.into_iter().skip(1).collect();
    let response = search.search(&SearchRequest::new("markets"), pool).unwrap();

    assert!(
        response
            .articles
            .iter()
            .all(|r| r.article.title != "markets")
    );
    assert_eq!(response.articles[0].article.title, "rates");
}

#[test]
fn test_torn_matrix_is_discarded_and_rebuilt() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    let request = SearchRequest::new("storm");

    open_search(dir.path(), generator.clone())
        .search(&request, articles.clone())
        .unwrap();
    let generation = open_search(dir.path(), generator.clone())
        .store()
        .unwrap()
        .read()
        .generation();

    // Truncate the committed matrix as a crash mid-write would
    let matrix = dir.path().join(format!("vectors-{generation}.bin"));
    let bytes = std::fs::read(&matrix).unwrap();
    std::fs::write(&matrix, &bytes[..bytes.len() / 2]).unwrap();

    let mut store = VectorCacheStore::open(dir.path(), MODEL, VectorDimension::new(3).unwrap())
        .unwrap();
    assert!(matches!(store.load(), CacheLoad::Corrupt { .. }));
    assert!(store.is_empty());

    let before = generator.texts();
    let response = open_search(dir.path(), generator.clone())
        .search(&request, articles)
        .unwrap();
    assert_eq!(generator.texts() - before, 6);
    assert_eq!(response.articles[0].article.title, "storm");

    let mut reloaded =
        VectorCacheStore::open(dir.path(), MODEL, VectorDimension::new(3).unwrap()).unwrap();
    assert!(matches!(reloaded.load(), CacheLoad::Loaded { rows: 5, .. }));
    assert!(reloaded.generation() > generation);
}

#[test]
fn test_garbage_manifest_starts_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();

    let mut store =
        VectorCacheStore::open(dir.path(), MODEL, VectorDimension::new(3).unwrap()).unwrap();
    assert!(matches!(store.load(), CacheLoad::Corrupt { .. }));
    assert!(store.is_empty());
}

#[test]
fn test_model_change_invalidates_cache() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    open_search(dir.path(), generator)
        .search(&SearchRequest::new("markets"), articles)
        .unwrap();

    let mut store =
        VectorCacheStore::open(dir.path(), "another-model", VectorDimension::new(3).unwrap())
            .unwrap();
    assert!(matches!(store.load(), CacheLoad::Corrupt { .. }));
    assert!(store.is_empty());
}

#[test]
fn test_clear_caches_removes_committed_vectors() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    let search = open_search(dir.path(), generator);
    search
        .search(&SearchRequest::new("markets"), articles)
        .unwrap();

    search.clear_caches().unwrap();
    assert!(search.store().unwrap().read().is_empty());
    assert!(!dir.path().join(MANIFEST_FILE).exists());

    let mut store =
        VectorCacheStore::open(dir.path(), MODEL, VectorDimension::new(3).unwrap()).unwrap();
    assert!(matches!(store.load(), CacheLoad::Missing));
}

#[test]
fn test_nearest_over_whole_store() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = five_articles();
    let search = open_search(dir.path(), generator);
    search
        .search(&SearchRequest::new("markets"), articles.clone())
        .unwrap();

    let nearest = search.nearest("markets", 2).unwrap();
    assert_eq!(nearest.len(), 2);
    assert_eq!(nearest[0].0, articles[0].id);
    assert_eq!(nearest[1].0, articles[1].id);
}
