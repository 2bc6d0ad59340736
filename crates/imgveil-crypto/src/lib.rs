//! `imgveil` chunk encryption library
//!
//! Cryptographic primitives for delivering an asset in encrypted chunks to a
//! client that negotiated its own key with the server.
//!
//! ## Crypto primitives
//!
//! - **Key agreement**: P-256 ephemeral ECDH, one server key pair per session
//! - **Key derivation**: HKDF-SHA256, 16 zero-byte salt, `"protected-image"` label
//! - **Encryption**: AES-256-GCM, 12-byte random nonce per chunk, detached 16-byte tag

pub mod cipher;
pub mod error;
pub mod exchange;
pub mod kdf;

pub use cipher::{ChunkCipher, NONCE_SIZE, SealedChunk, TAG_SIZE};
pub use error::CryptoError;
pub use exchange::EphemeralKeyPair;
pub use kdf::{ChunkKey, KDF_LABEL, KDF_SALT, derive, derive_chunk_key};
