//! In-memory session data map
//!
//! This is primarily for development and testing.
//! It stores the same encoded payloads under the same keys as
//! [`RedisSessionStore`](super::RedisSessionStore), so the codec, key prefix,
//! expiry and lifecycle rules behave identically without a server.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::SessionDataMap;
use crate::codec::{codec_for, SessionCodec, MIN_PAYLOAD_LEN};
use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::key::KeyBuilder;
use crate::lifecycle::{Lifecycle, Phase};
use crate::session::{SessionContext, SessionRecord};

struct StoredPayload {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredPayload {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |exp| exp > now)
    }
}

type Entries = Arc<RwLock<HashMap<Vec<u8>, StoredPayload>>>;

/// In-memory session store
///
/// Warning: This store is not suitable for production use because:
/// - Sessions are lost on server restart
/// - Sessions are not shared across multiple server instances
/// - Expired entries are only dropped when touched or purged
pub struct MemorySessionStore {
    ttl: Option<u64>,
    keys: KeyBuilder,
    codec: Arc<dyn SessionCodec>,
    lifecycle: Lifecycle<Entries>,
}

impl MemorySessionStore {
    /// Create a memory store honoring `config`'s prefix, expiry and format
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_codec(config, codec_for(config))
    }

    pub fn with_codec(config: &StoreConfig, codec: Arc<dyn SessionCodec>) -> Self {
        Self {
            ttl: config.ttl(),
            keys: KeyBuilder::new(config.key_prefix().map(str::to_string)),
            codec,
            lifecycle: Lifecycle::new("MemorySessionStore"),
        }
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> Result<usize, SessionError> {
        let (entries, _) = self.lifecycle.acquire()?;
        let now = Instant::now();
        let mut entries = entries.write();
        let before = entries.len();
        entries.retain(|_, stored| stored.is_live(now));
        Ok(before - entries.len())
    }

    /// Number of live entries
    pub fn len(&self) -> Result<usize, SessionError> {
        let (entries, _) = self.lifecycle.acquire()?;
        let now = Instant::now();
        let count = entries.read().values().filter(|s| s.is_live(now)).count();
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, SessionError> {
        self.len().map(|n| n == 0)
    }

    /// Place raw bytes under `id`, bypassing the codec.
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, id: &str, bytes: Vec<u8>) {
        let (entries, _) = self.lifecycle.acquire().unwrap();
        entries.write().insert(
            self.keys.build(id),
            StoredPayload {
                bytes,
                expires_at: None,
            },
        );
    }
}

#[async_trait]
impl SessionDataMap for MemorySessionStore {
    fn initialize(&self, context: SessionContext) -> Result<(), SessionError> {
        self.lifecycle
            .initialize(context, || Ok(Arc::new(RwLock::new(HashMap::new()))))
    }

    fn start(&self) -> Result<(), SessionError> {
        self.lifecycle.start()
    }

    fn stop(&self) {
        if let Some(entries) = self.lifecycle.stop() {
            debug!(entries = entries.read().len(), "releasing memory session map");
        }
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let (entries, context) = self.lifecycle.acquire()?;
        let key = self.keys.build(id);

        let bytes = {
            let entries = entries.read();
            match entries.get(&key) {
                Some(stored) if stored.is_live(Instant::now()) => stored.bytes.clone(),
                _ => return Ok(None),
            }
        };

        if bytes.len() < MIN_PAYLOAD_LEN {
            debug!(id, bytes = bytes.len(), "stored payload too short, treating as absent");
            return Ok(None);
        }
        self.codec.decode(id, &context, &bytes).map(Some)
    }

    async fn store(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let (entries, _) = self.lifecycle.acquire()?;
        let key = self.keys.build(id);
        let bytes = self.codec.encode(record)?;
        let expires_at = self
            .ttl
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        entries
            .write()
            .insert(key, StoredPayload { bytes, expires_at });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionError> {
        let (entries, _) = self.lifecycle.acquire()?;
        let key = self.keys.build(id);
        let removed = entries.write().remove(&key);
        Ok(removed.is_some_and(|stored| stored.is_live(Instant::now())))
    }
}
