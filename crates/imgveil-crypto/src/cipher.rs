//! Per-chunk AES-256-GCM encryption.
//!
//! Every call to [`ChunkCipher::encrypt`] draws a fresh 96-bit nonce from the
//! OS RNG. The tag travels separately from the ciphertext on the wire and is
//! glued back on (`ciphertext || tag`) before verification.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::kdf::ChunkKey;

/// Nonce size for AES-GCM.
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size for AES-GCM.
pub const TAG_SIZE: usize = 16;

/// One encrypted chunk with its detached tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedChunk {
    pub nonce: [u8; NONCE_SIZE],
    /// Same length as the plaintext.
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// AES-256-GCM keyed with a derived [`ChunkKey`].
pub struct ChunkCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for ChunkCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChunkCipher(..)")
    }
}

impl ChunkCipher {
    pub fn new(key: &ChunkKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypt one chunk under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<SealedChunk, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        self.encrypt_with_nonce(nonce, plaintext)
    }

    fn encrypt_with_nonce(
        &self,
        nonce: [u8; NONCE_SIZE],
        plaintext: &[u8],
    ) -> Result<SealedChunk, CryptoError> {
        let mut sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let split_at = sealed.len().checked_sub(TAG_SIZE).ok_or_else(|| {
            CryptoError::EncryptionFailed("AEAD output shorter than tag".into())
        })?;
        let tag_bytes = sealed.split_off(split_at);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&tag_bytes);

        Ok(SealedChunk {
            nonce,
            ciphertext: sealed,
            tag,
        })
    }

    /// Verify and decrypt one chunk.
    ///
    /// Fails closed: a wrong key, a modified nonce, ciphertext or tag, or a
    /// tag that is not exactly 16 bytes yields `AuthenticationFailed` and no
    /// plaintext.
    pub fn decrypt(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength {
                expected: NONCE_SIZE,
                actual: nonce.len(),
            });
        }
        if tag.len() != TAG_SIZE {
            return Err(CryptoError::AuthenticationFailed);
        }

        let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);

        self.cipher
            .decrypt(Nonce::from_slice(nonce), combined.as_slice())
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Convenience wrapper for [`SealedChunk`] values.
    pub fn open(&self, sealed: &SealedChunk) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(&sealed.nonce, &sealed.ciphertext, &sealed.tag)
    }
}
