//! Persistent vector cache keyed by article id.
//!
//! Vectors live in one contiguous row-major arena with an id → row index
//! next to it. New rows are appended in memory and committed by
//! [`VectorCacheStore::persist`], which writes a fresh generation of the
//! matrix and id files and then swaps the manifest. A crash at any point
//! leaves the previous generation as the committed state.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{RankResult, SearchError};
use crate::semantic::metadata::{CacheManifest, MANIFEST_FILE};
use crate::types::ArticleId;
use crate::vector::{VectorDimension, VectorMatrixFile, dot, normalize, write_atomic};

/// Result of [`VectorCacheStore::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLoad {
    /// A committed generation was restored.
    Loaded { rows: usize, generation: u64 },
    /// Nothing persisted yet.
    Missing,
    /// Persisted state was unusable; the store starts empty.
    Corrupt { reason: String },
}

/// Snapshot of store state for display.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub dimension: usize,
    pub model_name: String,
    pub generation: u64,
    pub dirty: bool,
    pub dir: PathBuf,
    /// Unix timestamp of the last commit, if any.
    pub updated_at: Option<u64>,
}

#[derive(Debug)]
pub struct VectorCacheStore {
    dir: PathBuf,
    model_name: String,
    dimension: VectorDimension,
    /// Row order; `ids[i]` owns `vectors[i * dim..(i + 1) * dim]`.
    ids: Vec<ArticleId>,
    rows: HashMap<ArticleId, usize>,
    vectors: Vec<f32>,
    /// Rows covered by the last successful persist or load.
    committed_rows: usize,
    generation: u64,
    created_at: Option<u64>,
    updated_at: Option<u64>,
}

impl VectorCacheStore {
    /// Create an empty store rooted at `dir`, creating the directory.
    ///
    /// Nothing is read until [`load`](Self::load) is called.
    pub fn open(
        dir: impl Into<PathBuf>,
        model_name: impl Into<String>,
        dimension: VectorDimension,
    ) -> RankResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| SearchError::Storage {
            message: format!("Failed to create cache directory {}: {e}", dir.display()),
            suggestion: "Check the semantic.cache_dir setting and directory permissions"
                .to_string(),
        })?;

        Ok(Self {
            dir,
            model_name: model_name.into(),
            dimension,
            ids: Vec::new(),
            rows: HashMap::new(),
            vectors: Vec::new(),
            committed_rows: 0,
            generation: 0,
            created_at: None,
            updated_at: None,
        })
    }

    /// Replace in-memory state with the committed generation on disk.
    ///
    /// Never fails: missing or unusable artifacts leave the store empty.
    pub fn load(&mut self) -> CacheLoad {
        self.clear_memory();

        if !CacheManifest::exists(&self.dir) {
            debug!("No vector cache at {}", self.dir.display());
            return CacheLoad::Missing;
        }

        let manifest = match CacheManifest::load(&self.dir) {
            Ok(manifest) => manifest,
            Err(e) => return self.corrupt(e.to_string()),
        };
        // Keep generation numbers increasing even if this one is rejected
        self.generation = manifest.generation;

        match self.read_generation(&manifest) {
            Ok((ids, vectors)) => {
                let rows = ids.len();
                self.rows = ids
                    .iter()
                    .enumerate()
                    .map(|(row, id)| (id.clone(), row))
                    .collect();
                self.ids = ids;
                self.vectors = vectors;
                self.committed_rows = rows;
                self.created_at = Some(manifest.created_at);
                self.updated_at = Some(manifest.updated_at);
                info!(
                    "Loaded vector cache generation {} with {rows} vectors from {}",
                    manifest.generation,
                    self.dir.display()
                );
                CacheLoad::Loaded {
                    rows,
                    generation: manifest.generation,
                }
            }
            Err(reason) => self.corrupt(reason),
        }
    }

    fn corrupt(&mut self, reason: String) -> CacheLoad {
        warn!(
            "Ignoring vector cache at {}: {reason}. Starting with an empty cache",
            self.dir.display()
        );
        self.clear_memory();
        CacheLoad::Corrupt { reason }
    }

    fn read_generation(
        &self,
        manifest: &CacheManifest,
    ) -> Result<(Vec<ArticleId>, Vec<f32>), String> {
        if manifest.model_name != self.model_name {
            return Err(format!(
                "built with model {}, running {}",
                manifest.model_name, self.model_name
            ));
        }
        if manifest.dimension != self.dimension.get() {
            return Err(format!(
                "dimension {} does not match encoder dimension {}",
                manifest.dimension, self.dimension
            ));
        }

        let matrix = VectorMatrixFile::new(self.dir.join(&manifest.vectors_file))
            .read()
            .map_err(|e| format!("vector matrix unreadable: {e}"))?;
        if matrix.sha256 != manifest.vectors_sha256 {
            return Err("vector matrix checksum mismatch".to_string());
        }
        if matrix.dimension != self.dimension || matrix.rows != manifest.rows {
            return Err(format!(
                "vector matrix holds {} rows of width {}, manifest says {} of width {}",
                matrix.rows, matrix.dimension, manifest.rows, manifest.dimension
            ));
        }

        let ids_json = std::fs::read_to_string(self.dir.join(&manifest.ids_file))
            .map_err(|e| format!("id mapping unreadable: {e}"))?;
        let ids: Vec<ArticleId> =
            serde_json::from_str(&ids_json).map_err(|e| format!("id mapping invalid: {e}"))?;
        if ids.len() != matrix.rows {
            return Err(format!(
                "id mapping has {} entries for {} vectors",
                ids.len(),
                matrix.rows
            ));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(*id)) {
            return Err(format!("duplicate id {dup} in id mapping"));
        }

        Ok((ids, matrix.data))
    }

    fn clear_memory(&mut self) {
        self.ids.clear();
        self.rows.clear();
        self.vectors.clear();
        self.committed_rows = 0;
        self.created_at = None;
        self.updated_at = None;
    }

    #[must_use]
    pub fn contains(&self, id: &ArticleId) -> bool {
        self.rows.contains_key(id)
    }

    /// Stored (normalized) vector for `id`.
    pub fn get(&self, id: &ArticleId) -> Option<&[f32]> {
        let dim = self.dimension.get();
        self.rows
            .get(id)
            .map(|&row| &self.vectors[row * dim..(row + 1) * dim])
    }

    /// Append entries whose ids are not cached yet.
    ///
    /// The whole batch is rejected if any vector has the wrong dimension.
    /// Returns the number of rows appended.
    pub fn add(&mut self, entries: Vec<(ArticleId, Vec<f32>)>) -> RankResult<usize> {
        for (_, vector) in &entries {
            self.dimension.validate_vector(vector)?;
        }

        let mut appended = 0;
        for (id, mut vector) in entries {
            if self.rows.contains_key(&id) {
                continue;
            }
            normalize(&mut vector);
            self.rows.insert(id.clone(), self.ids.len());
            self.ids.push(id);
            self.vectors.extend_from_slice(&vector);
            appended += 1;
        }

        if appended > 0 {
            debug!("Appended {appended} vectors, {} uncommitted", self.pending());
        }
        Ok(appended)
    }

    /// Commit all rows as a new generation.
    ///
    /// Returns `false` without touching disk when nothing changed. On error
    /// the previous generation stays committed and in-memory rows are kept
    /// dirty; callers decide whether to [`rollback`](Self::rollback).
    pub fn persist(&mut self) -> RankResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }

        let generation = self.generation + 1;
        let matrix = VectorMatrixFile::new(
            self.dir
                .join(CacheManifest::vectors_file_name(generation)),
        );
        let sha256 = matrix.write(self.dimension, &self.vectors)?;

        let ids_json = serde_json::to_vec(&self.ids).map_err(|e| SearchError::Storage {
            message: format!("Failed to serialize id mapping: {e}"),
            suggestion: "This is likely a bug in the code".to_string(),
        })?;
        write_atomic(
            &self.dir.join(CacheManifest::ids_file_name(generation)),
            &ids_json,
        )
        .map_err(|e| SearchError::Storage {
            message: format!("Failed to write id mapping: {e}"),
            suggestion: "Check disk space and file permissions".to_string(),
        })?;

        let mut manifest = CacheManifest::new(
            self.model_name.clone(),
            self.dimension.get(),
            self.ids.len(),
            generation,
            sha256,
        );
        if let Some(created_at) = self.created_at {
            manifest.created_at = created_at;
        }
        manifest.save(&self.dir)?;

        self.generation = generation;
        self.committed_rows = self.ids.len();
        self.created_at = Some(manifest.created_at);
        self.updated_at = Some(manifest.updated_at);
        info!(
            "Persisted vector cache generation {generation} with {} vectors",
            self.ids.len()
        );

        self.remove_stale_generations();
        Ok(true)
    }

    /// Delete data files of generations other than the committed one.
    fn remove_stale_generations(&self) {
        let keep = [
            CacheManifest::vectors_file_name(self.generation),
            CacheManifest::ids_file_name(self.generation),
        ];
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_generation_file(name) && !keep.iter().any(|k| k == name) {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    debug!("Could not remove stale cache file {name}: {e}");
                }
            }
        }
    }

    /// Drop rows appended since the last commit.
    pub fn rollback(&mut self) {
        if !self.is_dirty() {
            return;
        }
        let discarded = self.pending();
        for id in self.ids.drain(self.committed_rows..) {
            self.rows.remove(&id);
        }
        self.vectors
            .truncate(self.committed_rows * self.dimension.get());
        warn!("Rolled back {discarded} uncommitted vectors");
    }

    /// Forget every vector and delete the persisted cache.
    pub fn reset(&mut self) -> RankResult<()> {
        self.clear_memory();

        let manifest = self.dir.join(MANIFEST_FILE);
        if manifest.exists() {
            std::fs::remove_file(&manifest).map_err(|e| SearchError::Storage {
                message: format!("Failed to remove {}: {e}", manifest.display()),
                suggestion: "Check file permissions in the cache directory".to_string(),
            })?;
        }
        // With the manifest gone every data file is stale
        let entries = std::fs::read_dir(&self.dir).map_err(|e| SearchError::Storage {
            message: format!("Failed to list {}: {e}", self.dir.display()),
            suggestion: "Check file permissions in the cache directory".to_string(),
        })?;
        for entry in entries.flatten() {
            if entry.file_name().to_str().is_some_and(is_generation_file) {
                std::fs::remove_file(entry.path()).map_err(|e| SearchError::Storage {
                    message: format!("Failed to remove {}: {e}", entry.path().display()),
                    suggestion: "Check file permissions in the cache directory".to_string(),
                })?;
            }
        }

        info!("Cleared vector cache at {}", self.dir.display());
        Ok(())
    }

    /// Top `k` cached entries by inner product with `query`.
    ///
    /// Ties keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> RankResult<Vec<(ArticleId, f32)>> {
        self.dimension.validate_vector(query)?;
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let scores: Vec<f32> = self
            .vectors
            .par_chunks_exact(self.dimension.get())
            .map(|row| dot(row, query))
            .collect();

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(row, score)| (self.ids[row].clone(), score))
            .collect())
    }

    /// Like [`search`](Self::search) but only over `ids`.
    ///
    /// Ids that are not cached are skipped and ties keep their position
    /// in `ids`.
    pub fn search_among(
        &self,
        query: &[f32],
        ids: &[ArticleId],
        k: usize,
    ) -> RankResult<Vec<(ArticleId, f32)>> {
        self.dimension.validate_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let candidates: Vec<(&ArticleId, usize)> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.rows.get(id).map(|&row| (id, row)))
            .collect();

        let dim = self.dimension.get();
        let mut scored: Vec<(ArticleId, f32)> = candidates
            .par_iter()
            .map(|(id, row)| {
                let vector = &self.vectors[row * dim..(row + 1) * dim];
                ((*id).clone(), dot(vector, query))
            })
            .collect();

        // Stable: equal scores keep pool order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.ids.len(),
            dimension: self.dimension.get(),
            model_name: self.model_name.clone(),
            generation: self.generation,
            dirty: self.is_dirty(),
            dir: self.dir.clone(),
            updated_at: self.updated_at,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True when rows were added since the last commit.
    pub fn is_dirty(&self) -> bool {
        self.ids.len() != self.committed_rows
    }

    fn pending(&self) -> usize {
        self.ids.len() - self.committed_rows
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn is_generation_file(name: &str) -> bool {
    let numbered = |prefix: &str, suffix: &str| {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    };
    numbered("vectors-", ".bin") || numbered("ids-", ".json")
}
