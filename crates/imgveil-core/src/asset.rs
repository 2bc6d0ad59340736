//! The protected asset and its chunk layout.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Asset bytes held in memory, split into fixed-size chunks.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    bytes: Arc<[u8]>,
    chunk_size: usize,
    total_chunks: u32,
}

/// `ceil(len / chunk_size)`.
pub const fn total_chunks_for(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size)
}

impl ImageAsset {
    /// Wrap asset bytes. Empty assets and a zero chunk size are rejected:
    /// there would be no valid index to clamp requests into.
    pub fn new(bytes: impl Into<Arc<[u8]>>, chunk_size: usize) -> Result<Self> {
        let bytes = bytes.into();
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if bytes.is_empty() {
            return Err(Error::Config("asset is empty".into()));
        }
        let total_chunks = u32::try_from(total_chunks_for(bytes.len(), chunk_size))
            .map_err(|_| Error::Config("asset has too many chunks".into()))?;
        Ok(Self {
            bytes,
            chunk_size,
            total_chunks,
        })
    }

    /// Read the asset from disk.
    pub async fn load(path: &Path, chunk_size: usize) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Config(format!("Failed to read asset {}: {}", path.display(), e))
        })?;
        Self::new(bytes, chunk_size)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Coerce a requested index into `[0, total_chunks - 1]`.
    pub fn clamp_index(&self, requested: i64) -> u32 {
        let last = i64::from(self.total_chunks) - 1;
        u32::try_from(requested.clamp(0, last)).unwrap_or(0)
    }

    /// Plaintext of chunk `index`. Indices past the end yield the last chunk.
    pub fn chunk(&self, index: u32) -> &[u8] {
        let index = index.min(self.total_chunks - 1) as usize;
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.bytes.len());
        &self.bytes[start..end]
    }
}
