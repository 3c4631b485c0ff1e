//! Manifest for the persisted vector cache.
//!
//! The manifest names the current generation of the (matrix, id mapping)
//! pair and records the model that produced the vectors, so a restart with
//! a different model never mixes incompatible embeddings. Replacing the
//! manifest is the single commit point of a persist.

use crate::error::SearchError;
use crate::vector::write_atomic;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the manifest inside the cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current UTC time as seconds since the Unix epoch.
pub fn get_utc_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// Metadata for vector cache persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Version of the manifest format
    pub version: u32,

    /// Name of the embedding model used
    pub model_name: String,

    /// Dimension of embeddings
    pub dimension: usize,

    /// Number of rows in the committed matrix
    pub rows: usize,

    /// Monotonic generation number of the committed pair
    pub generation: u64,

    /// Matrix file name, relative to the cache directory
    pub vectors_file: String,

    /// Id mapping file name, relative to the cache directory
    pub ids_file: String,

    /// Hex SHA-256 of the matrix file
    pub vectors_sha256: String,

    /// Unix timestamp when created
    pub created_at: u64,

    /// Unix timestamp when last updated
    pub updated_at: u64,
}

impl CacheManifest {
    /// Current manifest version
    pub const CURRENT_VERSION: u32 = 1;

    /// Describe generation `generation` of a cache with `rows` vectors.
    pub fn new(
        model_name: impl Into<String>,
        dimension: usize,
        rows: usize,
        generation: u64,
        vectors_sha256: String,
    ) -> Self {
        let now = get_utc_timestamp();
        Self {
            version: Self::CURRENT_VERSION,
            model_name: model_name.into(),
            dimension,
            rows,
            generation,
            vectors_file: Self::vectors_file_name(generation),
            ids_file: Self::ids_file_name(generation),
            vectors_sha256,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn vectors_file_name(generation: u64) -> String {
        format!("vectors-{generation}.bin")
    }

    pub fn ids_file_name(generation: u64) -> String {
        format!("ids-{generation}.json")
    }

    /// Atomically replace the manifest in `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), SearchError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SearchError::Storage {
            message: format!("Failed to serialize manifest: {e}"),
            suggestion: "This is likely a bug in the code".to_string(),
        })?;

        write_atomic(&dir.join(MANIFEST_FILE), json.as_bytes()).map_err(|e| {
            SearchError::Storage {
                message: format!("Failed to write manifest: {e}"),
                suggestion: "Check disk space and file permissions".to_string(),
            }
        })
    }

    /// Load the manifest from `dir`.
    ///
    /// Any failure here means the persisted cache cannot be trusted.
    pub fn load(dir: &Path) -> Result<Self, SearchError> {
        let json = std::fs::read_to_string(dir.join(MANIFEST_FILE)).map_err(|e| {
            SearchError::CacheCorrupt {
                reason: format!("Failed to read manifest: {e}"),
            }
        })?;

        let manifest: Self = serde_json::from_str(&json).map_err(|e| SearchError::CacheCorrupt {
            reason: format!("Failed to parse manifest: {e}"),
        })?;

        if manifest.version > Self::CURRENT_VERSION {
            return Err(SearchError::CacheCorrupt {
                reason: format!(
                    "Manifest version {} is newer than supported version {}",
                    manifest.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(manifest)
    }

    /// Check if a manifest exists in `dir`
    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).exists()
    }
}
