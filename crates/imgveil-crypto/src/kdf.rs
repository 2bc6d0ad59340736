//! HKDF-SHA256 key derivation.
//!
//! Client and server derive the chunk key independently from the same ECDH
//! shared secret, so this must stay byte-for-byte identical to RFC 5869 and
//! to WebCrypto's `HKDF` with `hash: "SHA-256"`. A divergence is never
//! reported here; it shows up later as an authentication failure.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// HKDF info string bound into every chunk key.
pub const KDF_LABEL: &[u8] = b"protected-image";

/// HKDF salt: sixteen zero bytes on both sides of the exchange.
pub const KDF_SALT: [u8; 16] = [0u8; 16];

/// Length of an AES-256 key.
pub const KEY_SIZE: usize = 32;

/// A 256-bit symmetric key for chunk encryption.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChunkKey([u8; KEY_SIZE]);

impl ChunkKey {
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChunkKey(..)")
    }
}

/// Extract-then-expand HKDF-SHA256.
///
/// `prk = HMAC(salt, secret)`, then `T(i) = HMAC(prk, T(i-1) || label || i)`
/// until `out_len` bytes are available. Fails only when `out_len` exceeds
/// `255 * 32`.
pub fn derive(
    secret: &[u8],
    salt: &[u8],
    label: &[u8],
    out_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut okm = vec![0u8; out_len];
    derive_into(secret, salt, label, &mut okm)?;
    Ok(okm)
}

/// Derive the chunk key from a raw ECDH shared secret.
pub fn derive_chunk_key(shared_secret: &[u8]) -> Result<ChunkKey, CryptoError> {
    let mut key = [0u8; KEY_SIZE];
    derive_into(shared_secret, &KDF_SALT, KDF_LABEL, &mut key)?;
    let chunk_key = ChunkKey::from_bytes(key);
    key.zeroize();
    Ok(chunk_key)
}

/// Fill `out` with HKDF-SHA256 output.
fn derive_into(
    secret: &[u8],
    salt: &[u8],
    label: &[u8],
    out: &mut [u8],
) -> Result<(), CryptoError> {
    Hkdf::<Sha256>::new(Some(salt), secret)
        .expand(label, out)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
}
