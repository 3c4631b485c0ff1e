//! End-to-end ranking through the orchestrator on both retrieval paths.

use std::sync::Arc;

use newsrank::semantic::{ResultCache, SearchPath};
use newsrank::vector::VectorDimension;
use newsrank::{EncoderHandle, SearchError, SearchRequest, SemanticSearch, VectorCacheStore};
use tempfile::TempDir;

use crate::support::{FixedGenerator, article, assert_close, fixed_scenario};

fn scan_search(generator: Arc<FixedGenerator>) -> SemanticSearch {
    SemanticSearch::new(EncoderHandle::from_generator(generator))
}

fn cached_search(generator: Arc<FixedGenerator>, dir: &TempDir) -> SemanticSearch {
    let dimension = VectorDimension::new(2).unwrap();
    let store =
        VectorCacheStore::open(dir.path().join("vectors"), "fixed-test-model", dimension).unwrap();
    SemanticSearch::new(EncoderHandle::from_generator(generator)).with_store(store)
}

#[test]
fn test_scan_path_filters_and_orders() {
    let (generator, articles) = fixed_scenario();
    let search = scan_search(generator);
    assert_eq!(search.path(), SearchPath::Scan);

    let request = SearchRequest::new("인공지능").with_num(10).with_min_similarity(0.3);
    let response = search.search(&request, articles).unwrap();

    assert_eq!(response.total, 2);
    assert_eq!(response.query, "인공지능");
    assert_eq!(response.articles[0].article.title, "alpha");
    assert_close(response.articles[0].similarity_score, 0.8);
    assert_eq!(response.articles[1].article.title, "beta");
    assert_close(response.articles[1].similarity_score, 0.5);
}

#[test]
fn test_cache_path_matches_scan_path() {
    let dir = TempDir::new().unwrap();
    let (generator, articles) = fixed_scenario();
    let search = cached_search(generator, &dir);
    assert_eq!(search.path(), SearchPath::Cache);

    let request = SearchRequest::new("인공지능").with_num(10).with_min_similarity(0.3);
    let response = search.search(&request, articles).unwrap();

    let titles: Vec<&str> = response
        .articles
        .iter()
        .map(|r| r.article.title.as_str())
        .collect();
    assert_eq!(titles, vec!["alpha", "beta"]);
    assert_close(response.articles[0].similarity_score, 0.8);
    assert_close(response.articles[1].similarity_score, 0.5);
}

#[test]
fn test_num_truncates_after_sorting() {
    let (generator, articles) = fixed_scenario();
    let search = scan_search(generator);

    let response = search
        .search(&SearchRequest::new("인공지능").with_num(1), articles)
        .unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.articles[0].article.title, "alpha");
}

#[test]
fn test_duplicates_are_ranked_once() {
    let (generator, mut articles) = fixed_scenario();
    articles.push(article("alpha", "https://news.example/alpha"));
    let search = scan_search(generator.clone());

    let response = search.search(&SearchRequest::new("인공지능"), articles).unwrap();

    assert_eq!(response.total, 3);
    let alphas = response
        .articles
        .iter()
        .filter(|r| r.article.title == "alpha")
        .count();
    assert_eq!(alphas, 1);
    // Query plus three unique articles
    assert_eq!(generator.texts(), 4);
}

#[test]
fn test_empty_pool_is_an_empty_success() {
    let (generator, _) = fixed_scenario();
    let search = scan_search(generator);

    let response = search.search(&SearchRequest::new("인공지능"), Vec::new()).unwrap();
    assert!(response.is_empty());
    assert_eq!(response.total, 0);
}

#[test]
fn test_invalid_request_is_rejected_before_encoding() {
    let (generator, articles) = fixed_scenario();
    let search = scan_search(generator.clone());

    let err = search
        .search(&SearchRequest::new("   "), articles.clone())
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidRequest { .. }));

    let err = search
        .search(&SearchRequest::new("인공지능").with_chunk_size(5), articles)
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidRequest { .. }));
    assert_eq!(generator.calls(), 0);
}

#[test]
fn test_unavailable_encoder() {
    let (_, articles) = fixed_scenario();
    let search = SemanticSearch::new(EncoderHandle::unavailable("model download failed"));
    assert!(!search.is_available());

    let err = search.search(&SearchRequest::new("인공지능"), articles).unwrap_err();
    assert!(matches!(err, SearchError::EncodingUnavailable { .. }));
    assert_eq!(err.status_code(), "SERVICE_UNAVAILABLE");
}

#[test]
fn test_invalid_request_wins_over_unavailable_encoder() {
    let search = SemanticSearch::new(EncoderHandle::unavailable("offline"));
    let err = search
        .search(&SearchRequest::new("인공지능").with_num(0), Vec::new())
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidRequest { .. }));
}

#[test]
fn test_early_stop_skips_later_chunks() {
    let generator = Arc::new(
        FixedGenerator::new(2)
            .with("인공지능", &[1.0, 0.0])
            .with_fallback(&[1.0, 0.0]),
    );
    let articles: Vec<_> = (0..25)
        .map(|i| article(&format!("story {i}"), &format!("https://news.example/{i}")))
        .collect();
    let search = scan_search(generator.clone());

    let request = SearchRequest::new("인공지능")
        .with_chunk_size(10)
        .with_min_similarity(0.5)
        .with_early_stop(5);
    let response = search.search(&request, articles).unwrap();

    // First chunk already passes the threshold
    assert_eq!(response.total, 10);
    assert_eq!(generator.texts(), 11);
}

#[test]
fn test_response_cache_skips_encoding() {
    let (generator, articles) = fixed_scenario();
    let search = scan_search(generator.clone()).with_result_cache(ResultCache::default());
    let request = SearchRequest::new("인공지능").with_min_similarity(0.3);

    let first = search.search(&request, articles.clone()).unwrap();
    let calls = generator.calls();
    let second = search.search(&request, articles).unwrap();

    assert_eq!(first, second);
    assert_eq!(generator.calls(), calls);
}

#[test]
fn test_response_json_shape() {
    let (generator, articles) = fixed_scenario();
    let search = scan_search(generator);

    let response = search
        .search(&SearchRequest::new("인공지능").with_min_similarity(0.7), articles)
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["total"], 1);
    assert_eq!(json["query"], "인공지능");
    let first = &json["articles"][0];
    assert_eq!(first["title"], "alpha");
    assert_eq!(first["url"], "https://news.example/alpha");
    assert_eq!(first["source"], "wire");
    assert!(first["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(first["similarity_score"].as_f64().is_some());
    assert!(first.get("publishedAt").is_some());
}
