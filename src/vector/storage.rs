//! Binary vector matrix files with atomic replacement.
//!
//! # Storage Format
//!
//! - Header (16 bytes): magic `NRVC`, version, dimension, row count
//! - Rows: contiguous f32 arrays in little-endian format, row-major
//!
//! Row `i` of the matrix corresponds to entry `i` of the companion id
//! mapping. Files are never modified in place: every write goes to a
//! temporary file in the same directory which is then renamed over the
//! target, so readers observe either the old or the new file.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::vector::types::{VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes to identify vector matrix files.
const MAGIC_BYTES: &[u8; 4] = b"NRVC";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Errors specific to vector storage operations.
#[derive(Error, Debug)]
pub enum VectorStorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Decoded contents of a matrix file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixContents {
    pub dimension: VectorDimension,
    pub rows: usize,
    /// Row-major values, `rows * dimension` long.
    pub data: Vec<f32>,
    /// Hex SHA-256 of the whole file.
    pub sha256: String,
}

/// A single vector matrix file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorMatrixFile {
    path: PathBuf,
}

impl VectorMatrixFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the matrix file exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns the size of the matrix file in bytes.
    pub fn file_size(&self) -> Result<u64, io::Error> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Atomically writes `data` as a matrix of `dimension`-wide rows.
    ///
    /// Returns the hex SHA-256 of the bytes written, which callers record
    /// so a later read can detect a mismatched or damaged file.
    pub fn write(
        &self,
        dimension: VectorDimension,
        data: &[f32],
    ) -> Result<String, VectorStorageError> {
        let dim = dimension.get();
        if data.len() % dim != 0 {
            return Err(VectorStorageError::InvalidFormat(format!(
                "{} values do not form rows of width {dim}",
                data.len()
            )));
        }
        let rows = data.len() / dim;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len() * BYTES_PER_F32);
        bytes.extend_from_slice(MAGIC_BYTES);
        bytes.extend_from_slice(&STORAGE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&to_u32(dim, "dimension")?.to_le_bytes());
        bytes.extend_from_slice(&to_u32(rows, "row count")?.to_le_bytes());
        for value in data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        write_atomic(&self.path, &bytes)?;
        Ok(sha256_hex(&bytes))
    }

    /// Reads and validates the whole matrix.
    pub fn read(&self) -> Result<MatrixContents, VectorStorageError> {
        let file = File::open(&self.path)?;
        // SAFETY: matrix files are only ever replaced by rename, never
        // truncated or rewritten in place, so the mapping stays valid.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let (version, dimension, rows) = read_header(&mmap)?;
        if version != STORAGE_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: version,
            }
            .into());
        }

        // Header words are untrusted; a damaged file must not overflow
        let expected_len = rows
            .checked_mul(dimension.get())
            .and_then(|values| values.checked_mul(BYTES_PER_F32))
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                VectorStorageError::InvalidFormat(format!(
                    "header claims {rows} rows of width {dimension}, which no file can hold"
                ))
            })?;
        if mmap.len() != expected_len {
            return Err(VectorStorageError::InvalidFormat(format!(
                "expected {expected_len} bytes for {rows} rows of width {dimension}, found {}",
                mmap.len()
            )));
        }

        let data = mmap[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(MatrixContents {
            dimension,
            rows,
            data,
            sha256: sha256_hex(&mmap),
        })
    }
}

fn read_header(bytes: &[u8]) -> Result<(u32, VectorDimension, usize), VectorStorageError> {
    if bytes.len() < HEADER_SIZE {
        return Err(VectorStorageError::InvalidFormat(
            "File too small to contain header".to_string(),
        ));
    }

    if &bytes[0..4] != MAGIC_BYTES {
        return Err(VectorStorageError::InvalidFormat(
            "Invalid magic bytes".to_string(),
        ));
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let dim_value = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let dimension = VectorDimension::new(dim_value as usize)?;
    let rows = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;

    Ok((version, dimension, rows))
}

fn to_u32(value: usize, what: &str) -> Result<u32, VectorStorageError> {
    u32::try_from(value)
        .map_err(|_| VectorStorageError::InvalidFormat(format!("{what} {value} exceeds u32")))
}

/// Hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Replace `path` with `bytes` via a synced temporary file and a rename.
///
/// The temporary file lives in the destination directory so the rename
/// never crosses filesystems.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
