//! JSON wire messages.
//!
//! Byte fields travel as standard base64 strings. Field names are camelCase;
//! the short names used by earlier deployments (`serverPublic`,
//! `clientPublic`, `iv`) are accepted when deserialising.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use imgveil_crypto::SealedChunk;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Response to a session-init request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInit {
    pub session_id: String,
    #[serde(alias = "serverPublic")]
    pub server_public_key: String,
    pub chunk_size: usize,
    pub total_chunks: u32,
    /// Total plaintext length; absent when talking to servers that don't report it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_length: Option<usize>,
}

/// Request for one encrypted chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub session_id: String,
    #[serde(alias = "clientPublic")]
    pub client_public_key: String,
    /// Signed so that out-of-range requests can be clamped instead of rejected.
    #[serde(default, deserialize_with = "lenient_index")]
    pub chunk_index: i64,
}

/// One encrypted chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub ciphertext: String,
    #[serde(alias = "iv")]
    pub nonce: String,
    pub tag: String,
    /// Index actually served, after clamping.
    pub chunk_index: u32,
    pub total_chunks: u32,
}

/// Error body returned instead of a regular response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Raw bytes of a [`ChunkResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedChunk {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

/// Any JSON value a client may send as a chunk index.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawIndex {
    Number(serde_json::Number),
    Text(String),
    Other(serde_json::Value),
}

/// Saturate any numeric `chunkIndex` into `i64`; `null` and non-numeric
/// values read as 0. Range clamping happens later against the asset.
fn lenient_index<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let index = match RawIndex::deserialize(deserializer)? {
        RawIndex::Number(n) => number_to_index(&n),
        RawIndex::Text(text) => text.trim().parse::<f64>().map_or(0, saturate),
        RawIndex::Other(_) => 0,
    };
    Ok(index)
}

fn number_to_index(n: &serde_json::Number) -> i64 {
    if let Some(i) = n.as_i64() {
        i
    } else if n.as_u64().is_some() {
        i64::MAX
    } else {
        n.as_f64().map_or(0, saturate)
    }
}

/// Float-to-int `as` saturates at the `i64` bounds and maps NaN to 0.
#[allow(clippy::cast_possible_truncation)]
fn saturate(f: f64) -> i64 {
    f as i64
}

impl ChunkResponse {
    pub fn from_sealed(sealed: &SealedChunk, chunk_index: u32, total_chunks: u32) -> Self {
        Self {
            ciphertext: encode(&sealed.ciphertext),
            nonce: encode(&sealed.nonce),
            tag: encode(&sealed.tag),
            chunk_index,
            total_chunks,
        }
    }

    /// Decode the base64 fields. Malformed base64 is a chunk mismatch.
    pub fn decode(&self) -> Result<EncryptedChunk> {
        let field = |name: &str, value: &str| {
            decode(value).map_err(|e| {
                Error::ChunkMismatch(format!("chunk {}: bad {name}: {e}", self.chunk_index))
            })
        };
        Ok(EncryptedChunk {
            nonce: field("nonce", &self.nonce)?,
            ciphertext: field("ciphertext", &self.ciphertext)?,
            tag: field("tag", &self.tag)?,
        })
    }
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Standard base64 encoding.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Standard base64 decoding.
pub fn decode(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}
