//! Store factory

use std::sync::Arc;

use super::{MemorySessionStore, RedisSessionStore};
use crate::codec::{codec_for, SessionCodec};
use crate::config::StoreConfig;

/// Hands out stores that share one validated configuration.
///
/// Each web context gets its own store (and so its own pool); the factory
/// keeps the configuration and codec in one place.
#[derive(Clone)]
pub struct SessionDataMapFactory {
    config: StoreConfig,
    codec: Arc<dyn SessionCodec>,
}

impl SessionDataMapFactory {
    pub fn new(config: StoreConfig) -> Self {
        let codec = codec_for(&config);
        Self { config, codec }
    }

    /// Use a custom codec for every store this factory creates
    pub fn with_codec(mut self, codec: Arc<dyn SessionCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// A fresh, uninitialized redis store
    pub fn redis_store(&self) -> RedisSessionStore {
        RedisSessionStore::with_codec(self.config.clone(), Arc::clone(&self.codec))
    }

    /// A fresh, uninitialized in-memory store
    pub fn memory_store(&self) -> MemorySessionStore {
        MemorySessionStore::with_codec(&self.config, Arc::clone(&self.codec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PayloadFormat;
    use crate::lifecycle::Phase;
    use crate::session::{SessionContext, SessionRecord};
    use crate::store::SessionDataMap;

    #[tokio::test]
    async fn test_stores_share_configuration() {
        let config = StoreConfig::builder()
            .key_prefix("shared:")
            .format(PayloadFormat::Flagged)
            .build()
            .unwrap();
        let factory = SessionDataMapFactory::new(config);

        let redis = factory.redis_store();
        assert_eq!(redis.config().key_prefix(), Some("shared:"));
        assert_eq!(redis.phase(), Phase::Uninitialized);

        let memory = factory.memory_store();
        memory.initialize(SessionContext::new("/", "localhost")).unwrap();
        memory.start().unwrap();

        let record = SessionRecord::new("id", SessionContext::new("/", "localhost"), 1, 2, 3, 4);
        memory.store("id", &record).await.unwrap();
        assert_eq!(memory.load("id").await.unwrap(), Some(record));
    }
}
