//! Embedding generation for article and query text.
//!
//! The [`EmbeddingGenerator`] trait is the seam between the ranking engine
//! and the model runtime. Production code uses [`FastEmbedGenerator`];
//! tests inject deterministic generators.

use crate::vector::{VectorDimension, VectorError};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

/// Models accepted by [`parse_embedding_model`], for error messages.
const SUPPORTED_MODELS: &str = "ParaphraseMLMiniLML12V2, ParaphraseMLMpnetBaseV2, MultilingualE5Small, MultilingualE5Base, AllMiniLML6V2, AllMiniLML12V2";

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe and deterministic: the same text
/// always maps to the same vector for the lifetime of the model.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts, one per input in order.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Stable name of the underlying model, recorded next to persisted vectors.
    #[must_use]
    fn model_name(&self) -> &str;
}

/// FastEmbed implementation backed by an ONNX sentence-embedding model.
///
/// The model is downloaded on first use into `cache_dir` and loaded once;
/// `TextEmbedding::embed` needs `&mut self`, hence the mutex.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &"<TextEmbedding>")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Load `model`, caching its files under `cache_dir`.
    ///
    /// The output dimension is probed with a test embedding so that any
    /// supported model can be used without a hard-coded table.
    ///
    /// # Errors
    /// Returns an error if the model fails to download or initialize.
    pub fn new(
        model: EmbeddingModel,
        cache_dir: &Path,
        show_download_progress: bool,
    ) -> Result<Self, VectorError> {
        let model_name = model_to_string(&model);

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| VectorError::ModelInit(e.to_string()))?;

        let probe = text_model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::ModelInit(format!("probe embedding failed: {e}")))?;
        let dimension = probe
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| VectorError::ModelInit("probe returned no embedding".to_string()))?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension: VectorDimension::new(dimension)?,
            model_name,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Parse a model name from configuration.
///
/// Names match the `fastembed::EmbeddingModel` variant names.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name {
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "ParaphraseMLMpnetBaseV2" => Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        "MultilingualE5Base" => Ok(EmbeddingModel::MultilingualE5Base),
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        _ => Err(VectorError::UnknownModel {
            name: name.to_string(),
            supported: SUPPORTED_MODELS,
        }),
    }
}

/// Stable string form of a model, the inverse of [`parse_embedding_model`].
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    format!("{model:?}")
}

/// Scale `vector` to unit length in place.
///
/// Zero vectors are left untouched, so they score 0 against everything.
pub fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}

/// Inner product of two equally sized vectors.
///
/// For unit vectors this is the cosine similarity.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Build the text embedded for an article: title followed by the snippet.
///
/// # Example
/// ```
/// use newsrank::vector::create_article_text;
///
/// assert_eq!(create_article_text("Title", Some("body")), "Title body");
/// assert_eq!(create_article_text("Title", Some("  ")), "Title");
/// assert_eq!(create_article_text("Title", None), "Title");
/// ```
#[must_use]
pub fn create_article_text(title: &str, snippet: Option<&str>) -> String {
    match snippet.map(str::trim) {
        Some(snippet) if !snippet.is_empty() => format!("{title} {snippet}"),
        _ => title.to_string(),
    }
}

/// Deterministic bag-of-words generator for unit tests.
///
/// Each whitespace token is hashed into a bucket, so texts sharing words
/// score higher than unrelated ones. Counts model invocations and texts
/// so tests can assert that cached articles are never re-encoded.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
    calls: std::sync::atomic::AtomicUsize,
    texts: std::sync::atomic::AtomicUsize,
    fail_marker: Option<String>,
}

#[cfg(test)]
impl Default for MockEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    /// Create a mock generator with 256 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimension(VectorDimension::new(256).unwrap())
    }

    /// Create a generator with custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            calls: std::sync::atomic::AtomicUsize::new(0),
            texts: std::sync::atomic::AtomicUsize::new(0),
            fail_marker: None,
        }
    }

    /// Fail any batch containing a text with `marker` in it.
    #[must_use]
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Number of `generate_embeddings` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of texts embedded so far.
    pub fn texts_encoded(&self) -> usize {
        self.texts.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn bucket(token: &str, dim: usize) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.to_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % dim as u64) as usize
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_marker {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                return Err(VectorError::EmbeddingFailed(format!(
                    "mock failure on '{marker}'"
                )));
            }
        }
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);

        let dim = self.dimension.get();
        Ok(texts
            .iter()
            .map(|text| {
                let mut embedding = vec![0.0; dim];
                for token in text.split_whitespace() {
                    embedding[Self::bucket(token, dim)] += 1.0;
                }
                normalize(&mut embedding);
                embedding
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "MockBagOfWords"
    }
}
