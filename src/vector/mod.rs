//! Embedding vectors: generation, validation and on-disk matrices.
//!
//! This layer knows nothing about articles or requests. It turns text into
//! fixed-dimension `f32` vectors and stores row-major matrices of them in
//! memory-mapped files that are replaced atomically.

mod embedding;
mod storage;
mod types;

#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, create_article_text, dot, model_to_string, normalize,
    parse_embedding_model,
};
pub use storage::{MatrixContents, VectorMatrixFile, VectorStorageError, sha256_hex, write_atomic};
pub use types::{VECTOR_DIMENSION_384, VectorDimension, VectorError};
