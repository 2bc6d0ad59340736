//! Error types for `imgveil` core library.

use imgveil_crypto::CryptoError;
use thiserror::Error;

/// Result type alias using `imgveil` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Message returned to clients in place of internal details.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Core error types for `imgveil` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown session id; the client should start a new session
    #[error("Invalid session")]
    InvalidSession,

    /// Session outlived its TTL or was evicted
    #[error("Session expired")]
    SessionExpired,

    /// Malformed or wrong-length public key
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// AEAD tag mismatch while decrypting a chunk
    #[error("Chunk authentication failed")]
    AuthenticationFailure,

    /// Unexpected server-side fault
    #[error("Internal error: {0}")]
    Internal(String),

    /// Failure talking to the chunk source
    #[error("Transport error: {0}")]
    Transport(String),

    /// A chunk did not match what the assembler asked for
    #[error("Chunk mismatch: {0}")]
    ChunkMismatch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Text that may be shown to a remote client.
    ///
    /// Internal faults are replaced by a generic message.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::Io(_) | Self::Json(_) | Self::Config(_) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Whether the error is caused by the client's request rather than the server.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSession | Self::SessionExpired | Self::InvalidKeyMaterial(_)
        )
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyMaterial(msg) => Self::InvalidKeyMaterial(msg),
            CryptoError::AuthenticationFailed => Self::AuthenticationFailure,
            other => Self::Internal(other.to_string()),
        }
    }
}
