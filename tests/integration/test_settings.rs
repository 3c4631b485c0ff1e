//! Settings loading and orchestrator construction from configuration.

use newsrank::semantic::SearchPath;
use newsrank::{SearchError, SearchRequest, SemanticSearch, Settings};
use tempfile::TempDir;

#[test]
fn test_config_inside_workspace_anchors_relative_paths() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("desk");
    let config_path = Settings::init_config_file_in(&workspace, false).unwrap();

    let settings = Settings::load_from(&config_path).unwrap();

    let root = settings.workspace_root.clone().expect("workspace detected");
    assert!(root.ends_with("desk"));
    assert_eq!(settings.cache_dir(), root.join(".newsrank").join("vectors"));
}

#[test]
fn test_config_outside_workspace_keeps_relative_paths() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    std::fs::write(&config_path, "[semantic]\ncache_dir = \"vectors\"\n").unwrap();

    let settings = Settings::load_from(&config_path).unwrap();

    assert!(settings.workspace_root.is_none());
    assert_eq!(settings.cache_dir(), std::path::PathBuf::from("vectors"));
}

#[test]
fn test_disabled_semantic_search_degrades_without_loading_a_model() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(&config_path, "[semantic]\nenabled = false\n").unwrap();
    let settings = Settings::load_from(&config_path).unwrap();

    let search = SemanticSearch::from_settings(&settings);

    assert!(!search.is_available());
    assert_eq!(search.path(), SearchPath::Scan);
    assert!(search.result_cache().is_some());

    let err = search
        .search(&SearchRequest::new("markets"), Vec::new())
        .unwrap_err();
    assert!(matches!(err, SearchError::EncodingUnavailable { .. }));
}

#[test]
fn test_unknown_model_degrades() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        "[semantic]\nmodel = \"NoSuchModel\"\n\n[result_cache]\nenabled = false\n",
    )
    .unwrap();
    let settings = Settings::load_from(&config_path).unwrap();

    let search = SemanticSearch::from_settings(&settings);

    assert!(!search.is_available());
    assert!(search.result_cache().is_none());
}

#[test]
fn test_orchestrator_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SemanticSearch>();
}
