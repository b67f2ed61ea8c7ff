//! Session store implementations

mod factory;
mod memory;
mod redis_store;
mod traits;

pub use factory::SessionDataMapFactory;
pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;
pub use traits::SessionDataMap;
