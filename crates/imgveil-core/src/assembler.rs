//! Client-side chunk assembly.
//!
//! Chunks are encrypted independently and carry nothing but the index they
//! were requested with, so the assembler owns byte order: it fetches
//! `0..total_chunks` strictly in sequence and appends each decrypted chunk.
//! Any failure aborts the whole download and the partial buffer is dropped.

use std::future::Future;

use imgveil_crypto::{ChunkCipher, EphemeralKeyPair};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::wire::{self, ChunkResponse, SessionInit};

/// Cap on the up-front allocation when the server advertises a huge asset.
const MAX_PREALLOCATION: usize = 64 * 1024 * 1024;

/// Where encrypted chunks come from (an HTTP client, an in-process service...).
pub trait ChunkSource {
    /// Fetch the encrypted chunk at `index`.
    fn fetch(&self, index: u32) -> impl Future<Output = Result<ChunkResponse>> + Send;
}

/// Decrypts and concatenates the chunks of one session.
#[derive(Debug)]
pub struct ChunkAssembler {
    cipher: ChunkCipher,
    client_public_key: Option<String>,
    total_chunks: u32,
    chunk_size: usize,
    expected_len: Option<usize>,
}

impl ChunkAssembler {
    pub const fn new(cipher: ChunkCipher, total_chunks: u32, chunk_size: usize) -> Self {
        Self {
            cipher,
            client_public_key: None,
            total_chunks,
            chunk_size,
            expected_len: None,
        }
    }

    /// Run the client half of the key agreement for a freshly issued session.
    ///
    /// Generates the client's ephemeral key pair, derives the chunk key from
    /// the server's public key and keeps the client public key for requests.
    pub fn from_session_init(init: &SessionInit) -> Result<Self> {
        check_layout(init.total_chunks, init.chunk_size, init.image_length)?;
        let server_public = wire::decode(&init.server_public_key).map_err(|e| {
            Error::InvalidKeyMaterial(format!("server public key is not valid base64: {e}"))
        })?;

        let key_pair = EphemeralKeyPair::generate();
        let cipher = key_pair.agree(&server_public)?;

        let mut assembler = Self::new(cipher, init.total_chunks, init.chunk_size);
        assembler.client_public_key = Some(wire::encode(&key_pair.public_bytes()));
        assembler.expected_len = init.image_length;
        Ok(assembler)
    }

    /// Require the assembled output to be exactly `len` bytes.
    #[must_use]
    pub fn with_expected_len(mut self, len: usize) -> Self {
        self.expected_len = Some(len);
        self
    }

    /// Base64 client public key to send with every chunk request.
    pub fn client_public_key(&self) -> Option<&str> {
        self.client_public_key.as_deref()
    }

    pub const fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Fetch, verify and decrypt every chunk in index order.
    pub async fn assemble<S: ChunkSource + Sync>(&self, source: &S) -> Result<Vec<u8>> {
        check_layout(self.total_chunks, self.chunk_size, self.expected_len)?;
        let upper_bound = self
            .expected_len
            .unwrap_or_else(|| (self.total_chunks as usize).saturating_mul(self.chunk_size));
        let mut out = Vec::with_capacity(upper_bound.min(MAX_PREALLOCATION));

        for index in 0..self.total_chunks {
            let response = source.fetch(index).await?;
            let plaintext = self.open_chunk(index, &response)?;
            out.extend_from_slice(&plaintext);
            debug!(
                chunk_index = index,
                total_chunks = self.total_chunks,
                bytes = plaintext.len(),
                "Chunk decrypted"
            );
        }

        if let Some(expected) = self.expected_len {
            if out.len() != expected {
                return Err(Error::ChunkMismatch(format!(
                    "assembled {} bytes, expected {expected}",
                    out.len()
                )));
            }
        }

        info!(
            bytes = out.len(),
            total_chunks = self.total_chunks,
            "Asset assembled"
        );
        Ok(out)
    }

    fn open_chunk(&self, index: u32, response: &ChunkResponse) -> Result<Vec<u8>> {
        if response.chunk_index != index {
            return Err(Error::ChunkMismatch(format!(
                "requested chunk {index}, received chunk {}",
                response.chunk_index
            )));
        }
        if response.total_chunks != self.total_chunks {
            return Err(Error::ChunkMismatch(format!(
                "session has {} chunks, response claims {}",
                self.total_chunks, response.total_chunks
            )));
        }

        let raw = response.decode()?;
        let plaintext = self
            .cipher
            .decrypt(&raw.nonce, &raw.ciphertext, &raw.tag)
            .map_err(|_| Error::AuthenticationFailure)?;

        let is_last = index + 1 == self.total_chunks;
        let size_ok = if is_last {
            !plaintext.is_empty() && plaintext.len() <= self.chunk_size
        } else {
            plaintext.len() == self.chunk_size
        };
        if !size_ok {
            return Err(Error::ChunkMismatch(format!(
                "chunk {index} has {} bytes (chunk size {})",
                plaintext.len(),
                self.chunk_size
            )));
        }
        Ok(plaintext)
    }
}

/// Reject chunk layouts no real asset can have: no chunks, a zero chunk
/// size, or a length the advertised chunk count cannot hold exactly.
fn check_layout(
    total_chunks: u32,
    chunk_size: usize,
    image_length: Option<usize>,
) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::ChunkMismatch("server advertised a zero chunk size".into()));
    }
    if total_chunks == 0 {
        return Err(Error::ChunkMismatch("server advertised zero chunks".into()));
    }
    if let Some(len) = image_length {
        let full_chunks = usize::try_from(total_chunks - 1).unwrap_or(usize::MAX);
        let lower = full_chunks.saturating_mul(chunk_size);
        let upper = lower.saturating_add(chunk_size);
        if len <= lower || len > upper {
            return Err(Error::ChunkMismatch(format!(
                "image length {len} does not fit {total_chunks} chunks of {chunk_size} bytes"
            )));
        }
    }
    Ok(())
}
