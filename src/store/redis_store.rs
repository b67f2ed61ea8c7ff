//! Redis session data map
//!
//! Storage format:
//! - Key: `key_prefix + session_id` as UTF-8 bytes (no prefix by default)
//! - Value: the configured [`PayloadFormat`](crate::codec::PayloadFormat)
//! - TTL: `SETEX` with the configured expiry when it is positive, plain `SET`
//!   otherwise

use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, info};

use super::SessionDataMap;
use crate::codec::{codec_for, SessionCodec, MIN_PAYLOAD_LEN};
use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::key::KeyBuilder;
use crate::lifecycle::{Lifecycle, Phase};
use crate::pool::{PoolStats, SessionPool};
use crate::session::{SessionContext, SessionRecord};

/// Session store persisting records in redis
///
/// # Example
///
/// ```rust,ignore
/// use redis_session_store::{RedisSessionStore, SessionContext, SessionDataMap, StoreConfig};
///
/// let config = StoreConfig::from_url("redis://127.0.0.1:6379")?
///     .key_prefix("sess:")
///     .expiry_secs(1800)
///     .build()?;
/// let store = RedisSessionStore::new(config);
/// store.initialize(SessionContext::new("/", "localhost"))?;
/// store.start()?;
/// ```
pub struct RedisSessionStore {
    config: StoreConfig,
    keys: KeyBuilder,
    codec: Arc<dyn SessionCodec>,
    lifecycle: Lifecycle<SessionPool>,
}

impl RedisSessionStore {
    /// Create a store using the codec selected by the configuration
    pub fn new(config: StoreConfig) -> Self {
        let codec = codec_for(&config);
        Self::with_codec(config, codec)
    }

    /// Create a store with a custom codec
    pub fn with_codec(config: StoreConfig, codec: Arc<dyn SessionCodec>) -> Self {
        Self {
            keys: KeyBuilder::new(config.key_prefix().map(str::to_string)),
            config,
            codec,
            lifecycle: Lifecycle::new("RedisSessionStore"),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Pool usage, if the pool currently exists
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.lifecycle.acquire().ok().map(|(pool, _)| pool.stats())
    }
}

#[async_trait]
impl SessionDataMap for RedisSessionStore {
    fn initialize(&self, context: SessionContext) -> Result<(), SessionError> {
        self.lifecycle
            .initialize(context, || SessionPool::new(&self.config))
    }

    fn start(&self) -> Result<(), SessionError> {
        self.lifecycle.start()
    }

    fn stop(&self) {
        if let Some(pool) = self.lifecycle.stop() {
            info!(stats = ?pool.stats(), "releasing redis session pool");
            drop(pool);
        }
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let (pool, context) = self.lifecycle.acquire()?;
        let key = self.keys.build(id);

        let payload = pool
            .with_connection(move |conn| {
                Box::pin(async move {
                    let value: Option<Vec<u8>> = conn.get(key).await?;
                    Ok(value)
                })
            })
            .await?;

        match payload {
            Some(bytes) if bytes.len() >= MIN_PAYLOAD_LEN => {
                debug!(id, bytes = bytes.len(), "loaded session");
                self.codec.decode(id, &context, &bytes).map(Some)
            }
            Some(bytes) => {
                debug!(id, bytes = bytes.len(), "stored payload too short, treating as absent");
                Ok(None)
            }
            None => {
                debug!(id, "no stored session");
                Ok(None)
            }
        }
    }

    async fn store(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError> {
        let (pool, _) = self.lifecycle.acquire()?;
        let key = self.keys.build(id);
        let payload = self.codec.encode(record)?;
        let bytes = payload.len();
        let ttl = self.config.ttl();

        pool.with_connection(move |conn| {
            Box::pin(async move {
                match ttl {
                    Some(secs) => {
                        let _: () = conn.set_ex(key, payload, secs).await?;
                    }
                    None => {
                        let _: () = conn.set(key, payload).await?;
                    }
                }
                Ok(())
            })
        })
        .await?;

        debug!(id, bytes, ttl = ?ttl, "stored session");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionError> {
        let (pool, _) = self.lifecycle.acquire()?;
        let key = self.keys.build(id);

        let removed: usize = pool
            .with_connection(move |conn| Box::pin(async move { conn.del(key).await }))
            .await?;

        debug!(id, removed, "deleted session");
        Ok(removed > 0)
    }
}

impl Drop for RedisSessionStore {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    // Tests marked #[ignore] require a running Redis instance
    // Run with: cargo test -- --ignored

    use super::*;
    use crate::codec::{CompressionMode, PayloadFormat};
    use std::time::Duration;

    fn context() -> SessionContext {
        SessionContext::new("/", "0.0.0.0")
    }

    fn record(id: &str, val: &str) -> SessionRecord {
        let mut record = SessionRecord::fresh(id, context(), 1_800_000);
        record.set("val", val);
        record
    }

    async fn started(config: StoreConfig) -> RedisSessionStore {
        let store = RedisSessionStore::new(config);
        store.initialize(context()).unwrap();
        store.start().unwrap();
        store
    }

    #[tokio::test]
    async fn test_operations_before_start_fail() {
        let store = RedisSessionStore::new(StoreConfig::builder().build().unwrap());
        let sample = record("a", "1");

        assert!(store.load("a").await.unwrap_err().is_lifecycle());
        assert!(store.store("a", &sample).await.unwrap_err().is_lifecycle());
        assert!(store.delete("a").await.unwrap_err().is_lifecycle());

        store.initialize(context()).unwrap();
        assert!(store.load("a").await.unwrap_err().is_lifecycle());
    }

    #[tokio::test]
    async fn test_start_requires_initialize() {
        let store = RedisSessionStore::new(StoreConfig::builder().build().unwrap());
        assert!(store.start().unwrap_err().is_lifecycle());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let store = RedisSessionStore::new(StoreConfig::builder().build().unwrap());
        store.stop();
        store.initialize(context()).unwrap();
        store.start().unwrap();
        assert_eq!(store.phase(), Phase::Started);
        store.stop();
        store.stop();
        assert_eq!(store.phase(), Phase::Stopped);
        assert!(store.pool_stats().is_none());
        assert!(store.load("a").await.unwrap_err().is_lifecycle());
    }

    #[tokio::test]
    async fn test_initialize_after_start_rejected() {
        let store = started(StoreConfig::builder().build().unwrap()).await;
        assert!(store.initialize(context()).unwrap_err().is_lifecycle());
    }

    #[tokio::test]
    async fn test_refused_connection_surfaces_redis_error() {
        let config = StoreConfig::builder()
            .address("127.0.0.1", "1")
            .unwrap()
            .connection_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let store = started(config).await;
        let err = store.load("anything").await.unwrap_err();
        assert!(matches!(err, SessionError::Redis(_)), "unexpected error {:?}", err);

        let err = store.store("anything", &record("anything", "x")).await.unwrap_err();
        assert!(matches!(err, SessionError::Redis(_)), "unexpected error {:?}", err);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_store_round_trip_all_formats() {
        for format in [PayloadFormat::Framed, PayloadFormat::Flagged] {
            for compression in [false, true] {
                let config = StoreConfig::builder()
                    .key_prefix("test:rt:")
                    .format(format)
                    .compression(compression)
                    .compression_mode(CompressionMode::Zip)
                    .compression_threshold(0)
                    .build()
                    .unwrap();
                let store = started(config).await;

                let sample = record("round-trip", "välue ✓");
                store.store("round-trip", &sample).await.unwrap();
                let loaded = store.load("round-trip").await.unwrap().unwrap();
                assert_eq!(loaded, sample, "{:?} compression={}", format, compression);
                assert!(store.delete("round-trip").await.unwrap());
            }
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_store_absent_and_short_payloads() {
        let config = StoreConfig::builder().key_prefix("test:short:").build().unwrap();
        let store = started(config).await;
        store.delete("never").await.unwrap();
        assert!(store.load("never").await.unwrap().is_none());

        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.set("test:short:tiny", vec![1u8, 2, 3]).await.unwrap();
        let _: () = conn.set("test:short:empty", Vec::<u8>::new()).await.unwrap();

        assert!(store.load("tiny").await.unwrap().is_none());
        assert!(store.load("empty").await.unwrap().is_none());

        let _: () = conn.set("test:short:junk", vec![0u8; 12]).await.unwrap();
        assert!(store.load("junk").await.unwrap_err().is_decode());

        let _: usize = conn
            .del(vec!["test:short:tiny", "test:short:empty", "test:short:junk"])
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_store_delete_and_overwrite() {
        let config = StoreConfig::builder().key_prefix("test:del:").build().unwrap();
        let store = started(config).await;

        assert!(!store.delete("gone").await.unwrap());

        store.store("gone", &record("gone", "A")).await.unwrap();
        let b = record("gone", "B");
        store.store("gone", &b).await.unwrap();
        let loaded = store.load("gone").await.unwrap().unwrap();
        assert_eq!(loaded.get::<String>("val"), Some("B".to_string()));
        assert_eq!(loaded, b);

        assert!(store.delete("gone").await.unwrap());
        assert!(!store.delete("gone").await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_store_expiry() {
        let config = StoreConfig::builder()
            .key_prefix("test:ttl:")
            .expiry_secs(1)
            .build()
            .unwrap();
        let store = started(config).await;

        store.store("short", &record("short", "x")).await.unwrap();
        assert!(store.load("short").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(store.load("short").await.unwrap().is_none());
    }
}
