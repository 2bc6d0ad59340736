//! HTTP client for an imgveil server.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use imgveil_core::{
    ChunkAssembler, ChunkRequest, ChunkResponse, ChunkSource, Error, ErrorBody, Result,
    SessionInit,
};

/// Talks to `/api/server` on one imgveil server.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeliveryClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("server URL is empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server URL must start with http:// or https://: {base_url}"
            )));
        }

        // reqwest is built with rustls-no-provider; Err only means a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    /// URL of an API route.
    pub(crate) fn api_url(&self, route: &str) -> String {
        format!("{}/api/server?route={route}", self.base_url)
    }

    /// Start a session.
    pub async fn init_session(&self) -> Result<SessionInit> {
        let resp = self
            .http
            .get(self.api_url("session-init"))
            .send()
            .await
            .map_err(transport)?;
        read_json(resp).await
    }

    /// Fetch one encrypted chunk.
    pub async fn get_chunk(&self, request: &ChunkRequest) -> Result<ChunkResponse> {
        let resp = self
            .http
            .post(self.api_url("get-chunk"))
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        read_json(resp).await
    }

    /// Run a whole session and return the decrypted asset.
    pub async fn download(&self) -> Result<Vec<u8>> {
        let init = self.init_session().await?;
        info!(
            session_id = %init.session_id,
            total_chunks = init.total_chunks,
            chunk_size = init.chunk_size,
            "Session started"
        );

        let assembler = ChunkAssembler::from_session_init(&init)?;
        let client_public_key = assembler
            .client_public_key()
            .ok_or_else(|| Error::Internal("no client public key after key agreement".into()))?
            .to_string();
        let source = SessionChunks {
            client: self,
            session_id: init.session_id,
            client_public_key,
        };
        assembler.assemble(&source).await
    }
}

/// Chunks of one session, fetched over HTTP.
#[derive(Debug)]
pub struct SessionChunks<'a> {
    pub client: &'a DeliveryClient,
    pub session_id: String,
    pub client_public_key: String,
}

impl ChunkSource for SessionChunks<'_> {
    async fn fetch(&self, index: u32) -> Result<ChunkResponse> {
        debug!(chunk_index = index, "Requesting chunk");
        self.client
            .get_chunk(&ChunkRequest {
                session_id: self.session_id.clone(),
                client_public_key: self.client_public_key.clone(),
                chunk_index: i64::from(index),
            })
            .await
    }
}

fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return resp.json().await.map_err(transport);
    }
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("Unknown").to_string(),
    };
    Err(api_error(status, message))
}

/// Map an error response back onto the session errors the server reports.
fn api_error(status: StatusCode, message: String) -> Error {
    if status == StatusCode::BAD_REQUEST {
        if message == Error::InvalidSession.to_string() {
            return Error::InvalidSession;
        }
        if message == Error::SessionExpired.to_string() {
            return Error::SessionExpired;
        }
    }
    Error::Transport(format!("server returned {status}: {message}"))
}
