//! Session-keyed chunk delivery.
//!
//! Per session: `Created` (key pair issued) → `KeyAgreed` on the first chunk
//! request carrying a valid client public key, repeatable for every later
//! request → gone once the TTL elapses or the session is evicted.
//!
//! Every chunk request looks the session up before touching any key
//! material, so unknown ids fail without cryptographic work.

use tracing::debug;

use crate::asset::ImageAsset;
use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::wire::{self, ChunkRequest, ChunkResponse, SessionInit};

/// Serves one asset to any number of concurrent sessions.
#[derive(Clone)]
pub struct DeliveryService {
    store: SessionStore,
    asset: ImageAsset,
}

impl DeliveryService {
    pub const fn new(store: SessionStore, asset: ImageAsset) -> Self {
        Self { store, asset }
    }

    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    pub const fn asset(&self) -> &ImageAsset {
        &self.asset
    }

    /// Issue a session and its ephemeral public key.
    pub async fn init_session(&self) -> SessionInit {
        let session = self.store.create().await;
        SessionInit {
            session_id: session.id().to_string(),
            server_public_key: wire::encode(&session.public_key()),
            chunk_size: self.asset.chunk_size(),
            total_chunks: self.asset.total_chunks(),
            image_length: Some(self.asset.len()),
        }
    }

    /// Encrypt and return the requested chunk for the session's client.
    ///
    /// The index is clamped into range; the response carries the index
    /// actually served.
    pub async fn get_chunk(&self, request: &ChunkRequest) -> Result<ChunkResponse> {
        let session = self.store.get(&request.session_id).await?;

        let client_public = wire::decode(&request.client_public_key).map_err(|e| {
            Error::InvalidKeyMaterial(format!("client public key is not valid base64: {e}"))
        })?;
        let cipher = session.cipher_for(&client_public)?;

        let index = self.asset.clamp_index(request.chunk_index);
        let plaintext = self.asset.chunk(index);
        let sealed = cipher.encrypt(plaintext)?;

        debug!(
            session_id = %session.id(),
            requested = request.chunk_index,
            chunk_index = index,
            bytes = plaintext.len(),
            "Serving encrypted chunk"
        );

        Ok(ChunkResponse::from_sealed(
            &sealed,
            index,
            self.asset.total_chunks(),
        ))
    }
}
