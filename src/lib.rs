//! # redis-session-store
//!
//! Redis persistence for web server session data.
//!
//! The store sits between a host's in-process session cache and a redis
//! server: it encodes session records into bytes, writes and reads them under
//! a derived key, and manages the pooled connections to redis.
//!
//! ## Features
//!
//! - **Two payload layouts**: a self-describing frame (four big-endian time
//!   fields plus an attribute blob) and a flag-tagged frame (4-byte flag word
//!   plus a transcoded blob), both with optional gzip/zlib compression
//! - **Flat key namespace**: keys are `prefix + session_id`, nothing more
//! - **Optional expiry**: records are written with `SETEX` when a positive
//!   expiry is configured
//! - **Explicit lifecycle**: `initialize`, `start`, `stop`; every operation
//!   outside the started window fails immediately
//! - **Pooled connections**: bounded bb8 pool with connect/socket timeouts,
//!   auth, database selection, client name and TLS
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use redis_session_store::{
//!     RedisSessionStore, SessionContext, SessionDataMap, SessionRecord, StoreConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::from_url("redis://127.0.0.1:6379")?
//!         .key_prefix("sess:")
//!         .expiry_secs(1800)
//!         .compression(true)
//!         .build()?;
//!
//!     let store = RedisSessionStore::new(config);
//!     store.initialize(SessionContext::new("/", "localhost"))?;
//!     store.start()?;
//!
//!     let mut record = SessionRecord::fresh("node0abc", SessionContext::new("/", "localhost"), 1_800_000);
//!     record.set("views", 1);
//!     store.store("node0abc", &record).await?;
//!
//!     let loaded = store.load("node0abc").await?;
//!     assert_eq!(loaded.and_then(|r| r.get::<i32>("views")), Some(1));
//!
//!     store.stop();
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod key;
mod lifecycle;
pub mod pool;
pub mod session;
pub mod store;

pub use codec::{CompressionMode, PayloadFormat, SessionCodec};
pub use config::{StoreConfig, StoreConfigBuilder, TlsMaterial};
pub use error::{SessionError, SessionResult};
pub use key::KeyBuilder;
pub use lifecycle::Phase;
pub use pool::{PoolStats, SessionPool};
pub use session::{Attributes, SessionContext, SessionRecord};
pub use store::{MemorySessionStore, RedisSessionStore, SessionDataMap, SessionDataMapFactory};
