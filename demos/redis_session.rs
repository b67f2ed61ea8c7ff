//! Redis session store walkthrough
//!
//! Stores, loads, overwrites and deletes a session against a local redis.
//!
//! Run with:
//!   SESSION_REDIS_URL=redis://127.0.0.1:6379 cargo run --example redis_session

use redis_session_store::{
    PayloadFormat, RedisSessionStore, SessionContext, SessionDataMap, SessionRecord, StoreConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = StoreConfig::from_env()?
        .key_prefix("demo:sess:")
        .expiry_secs(300)
        .compression(true)
        .format(PayloadFormat::Framed)
        .client_name("redis-session-demo")
        .build()?;

    println!("Connecting to {}:{}", config.host(), config.port());

    let context = SessionContext::new("/", "localhost");
    let store = RedisSessionStore::new(config);
    store.initialize(context.clone())?;
    store.start()?;

    let id = "demo-session";
    let mut record = SessionRecord::fresh(id, context.clone(), 30 * 60 * 1000);
    record.set("user", "alice");
    record.set("views", 1);
    store.store(id, &record).await?;

    match store.load(id).await? {
        Some(loaded) => println!(
            "Loaded {} for {:?}, views = {:?}",
            loaded.id,
            loaded.get::<String>("user"),
            loaded.get::<i32>("views")
        ),
        None => println!("Session {} vanished", id),
    }

    record.set("views", 2);
    store.store(id, &record).await?;
    let views = store
        .load(id)
        .await?
        .and_then(|loaded| loaded.get::<i32>("views"));
    println!("After overwrite, views = {:?}", views);

    println!("Deleted: {}", store.delete(id).await?);
    println!("Deleted again: {}", store.delete(id).await?);
    println!("Pool: {:?}", store.pool_stats());

    store.stop();
    Ok(())
}
