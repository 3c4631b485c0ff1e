//! Shared fixtures for integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use newsrank::Article;
use newsrank::vector::{EmbeddingGenerator, VectorDimension, VectorError};

/// Generator returning hand-picked vectors per text.
///
/// Unknown texts get the fallback vector, or fail when there is none.
pub struct FixedGenerator {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    dimension: VectorDimension,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl FixedGenerator {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback: None,
            dimension: VectorDimension::new(dimension).unwrap(),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: &[f32]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }

    pub fn with_fallback(mut self, vector: &[f32]) -> Self {
        self.fallback = Some(vector.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total texts encoded across all calls.
    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }
}

impl EmbeddingGenerator for FixedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(*text)
                    .or(self.fallback.as_ref())
                    .cloned()
                    .ok_or_else(|| VectorError::EmbeddingFailed(format!("no vector for {text:?}")))
            })
            .collect()
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "fixed-test-model"
    }
}

/// Three articles at known cosine similarity to the query "인공지능".
///
/// Scores against `[1, 0]` are 0.8, 0.5 and 0.2.
pub fn fixed_scenario() -> (Arc<FixedGenerator>, Vec<Article>) {
    let generator = FixedGenerator::new(2)
        .with("인공지능", &[1.0, 0.0])
        .with("alpha", &[0.8, 0.6])
        .with("beta", &[0.5, 0.866_025_4])
        .with("gamma", &[0.2, 0.979_795_9]);
    let articles = vec![
        article("gamma", "https://news.example/gamma"),
        article("alpha", "https://news.example/alpha"),
        article("beta", "https://news.example/beta"),
    ];
    (Arc::new(generator), articles)
}

pub fn article(title: &str, url: &str) -> Article {
    Article::new(title, url, "wire")
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
