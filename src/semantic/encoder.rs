//! Text encoder with an explicit availability capability.
//!
//! The model is loaded once at startup. A failed load does not abort the
//! process: it yields [`EncoderHandle::Unavailable`] and semantic search
//! reports service-unavailable for the rest of the run instead of retrying.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SemanticConfig;
use crate::error::{RankResult, SearchError};
use crate::vector::{
    EmbeddingGenerator, FastEmbedGenerator, VectorDimension, normalize, parse_embedding_model,
};

/// Encodes text into unit-length vectors.
///
/// Blank texts map to the zero vector without reaching the model.
#[derive(Clone)]
pub struct TextEncoder {
    generator: Arc<dyn EmbeddingGenerator>,
}

impl std::fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEncoder")
            .field("model_name", &self.generator.model_name())
            .field("dimension", &self.generator.dimension())
            .finish()
    }
}

impl TextEncoder {
    pub fn new(generator: Arc<dyn EmbeddingGenerator>) -> Self {
        Self { generator }
    }

    pub fn dimension(&self) -> VectorDimension {
        self.generator.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Encode a single text.
    pub fn encode_one(&self, text: &str) -> RankResult<Vec<f32>> {
        self.encode_many(&[text])?
            .pop()
            .ok_or_else(|| SearchError::EncodingFailure {
                reason: "model returned no embedding".to_string(),
            })
    }

    /// Encode a batch in one model call, preserving input order.
    pub fn encode_many(&self, texts: &[&str]) -> RankResult<Vec<Vec<f32>>> {
        let dim = self.dimension().get();
        let pending: Vec<&str> = texts
            .iter()
            .copied()
            .filter(|t| !t.trim().is_empty())
            .collect();

        let mut encoded = if pending.is_empty() {
            Vec::new()
        } else {
            self.generator
                .generate_embeddings(&pending)
                .map_err(|e| SearchError::EncodingFailure {
                    reason: e.to_string(),
                })?
        };
        if encoded.len() != pending.len() {
            return Err(SearchError::EncodingFailure {
                reason: format!(
                    "model returned {} embeddings for {} texts",
                    encoded.len(),
                    pending.len()
                ),
            });
        }

        let mut model_output = encoded.drain(..);
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            if text.trim().is_empty() {
                vectors.push(vec![0.0; dim]);
                continue;
            }
            // Lengths checked above
            let Some(mut vector) = model_output.next() else {
                break;
            };
            self.dimension().validate_vector(&vector)?;
            normalize(&mut vector);
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

/// Outcome of loading the embedding model, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub enum EncoderHandle {
    Available(TextEncoder),
    Unavailable { reason: String },
}

impl EncoderHandle {
    /// Load the configured model.
    ///
    /// Never fails: load errors are logged and captured as `Unavailable`.
    pub fn load(config: &SemanticConfig) -> Self {
        if !config.enabled {
            return Self::unavailable("semantic search is disabled in configuration");
        }

        let model = match parse_embedding_model(&config.model) {
            Ok(model) => model,
            Err(e) => {
                warn!("Semantic search disabled: {e}");
                return Self::unavailable(e.to_string());
            }
        };

        info!(
            "Loading embedding model {} from {}",
            config.model,
            config.model_cache_dir.display()
        );
        match FastEmbedGenerator::new(
            model,
            &config.model_cache_dir,
            config.show_download_progress,
        ) {
            Ok(generator) => {
                info!(
                    "Embedding model ready: {} ({} dimensions)",
                    generator.model_name(),
                    generator.dimension()
                );
                Self::from_generator(Arc::new(generator))
            }
            Err(e) => {
                warn!("Semantic search disabled, model failed to load: {e}");
                Self::unavailable(e.to_string())
            }
        }
    }

    /// Wrap an already constructed generator.
    pub fn from_generator(generator: Arc<dyn EmbeddingGenerator>) -> Self {
        Self::Available(TextEncoder::new(generator))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// The encoder, or `EncodingUnavailable` with the load failure reason.
    pub fn encoder(&self) -> RankResult<&TextEncoder> {
        match self {
            Self::Available(encoder) => Ok(encoder),
            Self::Unavailable { reason } => Err(SearchError::EncodingUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    pub fn encode_one(&self, text: &str) -> RankResult<Vec<f32>> {
        self.encoder()?.encode_one(text)
    }

    pub fn encode_many(&self, texts: &[&str]) -> RankResult<Vec<Vec<f32>>> {
        self.encoder()?.encode_many(texts)
    }
}
