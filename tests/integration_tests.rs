// Gateway file to expose integration tests from the integration/ subdirectory
// This file allows Rust's test runner to discover tests in subdirectories

#[path = "integration/support.rs"]
mod support;

#[path = "integration/test_search_ranking.rs"]
mod test_search_ranking;

#[path = "integration/test_vector_cache_persistence.rs"]
mod test_vector_cache_persistence;

#[path = "integration/test_settings.rs"]
mod test_settings;

#[path = "integration/embedding_model_comparison.rs"]
mod embedding_model_comparison;
