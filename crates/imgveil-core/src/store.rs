//! In-memory session store.
//!
//! Maps an opaque session id to the server's ephemeral key pair for that
//! session. Sessions expire after a TTL and the store holds at most
//! `max_sessions` entries, evicting the oldest when full.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use imgveil_crypto::{ChunkCipher, CryptoError, EphemeralKeyPair};
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::DeliveryConfig;
use crate::error::{Error, Result};

/// Random bytes behind a session id.
const SESSION_ID_BYTES: usize = 16;

/// Opaque, unguessable session identifier (hex of 128 random bits).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One client interaction bound to one ephemeral server key pair.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    key_pair: EphemeralKeyPair,
    created_at: Instant,
    /// Creation order within the store, used to pick eviction victims.
    seq: u64,
    /// Ciphers already derived for a client public key.
    ciphers: Mutex<HashMap<Vec<u8>, Arc<ChunkCipher>>>,
    max_cached_keys: usize,
}

impl Session {
    fn new(seq: u64, max_cached_keys: usize) -> Self {
        Self {
            id: SessionId::generate(),
            key_pair: EphemeralKeyPair::generate(),
            created_at: Instant::now(),
            seq,
            ciphers: Mutex::new(HashMap::new()),
            max_cached_keys,
        }
    }

    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Server public key for this session, uncompressed SEC1.
    pub fn public_key(&self) -> Vec<u8> {
        self.key_pair.public_bytes()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }

    /// Cipher keyed for `client_public`, deriving and caching it on first use.
    ///
    /// When the cache is full it is cleared before inserting.
    pub fn cipher_for(
        &self,
        client_public: &[u8],
    ) -> std::result::Result<Arc<ChunkCipher>, CryptoError> {
        if let Some(cipher) = self.lock_ciphers().get(client_public) {
            return Ok(Arc::clone(cipher));
        }

        let cipher = Arc::new(self.key_pair.agree(client_public)?);

        let mut ciphers = self.lock_ciphers();
        if ciphers.len() >= self.max_cached_keys {
            ciphers.clear();
        }
        ciphers.insert(client_public.to_vec(), Arc::clone(&cipher));
        debug!(session_id = %self.id, "Derived chunk key for client");
        Ok(cipher)
    }

    /// Number of client keys currently cached.
    pub fn cached_keys(&self) -> usize {
        self.lock_ciphers().len()
    }

    fn lock_ciphers(&self) -> MutexGuard<'_, HashMap<Vec<u8>, Arc<ChunkCipher>>> {
        self.ciphers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-safe store of live sessions.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
    next_seq: Arc<AtomicU64>,
    ttl: Duration,
    max_sessions: usize,
    max_cached_keys: usize,
}

impl SessionStore {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self::with_limits(config.session_ttl(), config.max_sessions, config.max_cached_keys)
    }

    pub fn with_limits(ttl: Duration, max_sessions: usize, max_cached_keys: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
            ttl,
            max_sessions: max_sessions.max(1),
            max_cached_keys: max_cached_keys.max(1),
        }
    }

    /// Create a session with a fresh id and key pair.
    pub async fn create(&self) -> Arc<Session> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(seq, self.max_cached_keys));

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            let ttl = self.ttl;
            sessions.retain(|_, s| !s.is_expired(ttl));
        }
        while sessions.len() >= self.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.seq)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session_id = %oldest, "Evicted oldest session to make room");
        }
        sessions.insert(session.id.clone(), Arc::clone(&session));
        info!(
            session_id = %session.id,
            live_sessions = sessions.len(),
            "Session created"
        );
        session
    }

    /// Look up a live session.
    ///
    /// Unknown ids yield `InvalidSession`; sessions past their TTL are
    /// removed and yield `SessionExpired`.
    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        let session = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(Error::InvalidSession)?;

        if session.is_expired(self.ttl) {
            self.sessions.write().await.remove(id);
            debug!(session_id = %id, "Session expired on lookup");
            return Err(Error::SessionExpired);
        }
        Ok(session)
    }

    /// Drop a session.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    /// Remove every expired session and return how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(ttl));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, live_sessions = sessions.len(), "Swept expired sessions");
        }
        removed
    }

    /// Count of live sessions (expired ones not yet swept included).
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
