//! Redis connection pool
//!
//! Connections are multiplexed redis connections handed out by a bb8 pool.
//! [`SessionPool::with_connection`] is the only way to use one: it checks a
//! connection out, runs the callback under the socket timeout and gives the
//! connection back on every path. A connection whose command failed at the
//! transport level is flagged broken and the pool discards it.

use bb8::{ErrorSink, Pool, RunError};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::AsyncConnectionConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{SessionError, SessionResult};

/// A pooled connection plus its health flag
pub struct SessionConnection {
    inner: MultiplexedConnection,
    broken: bool,
}

/// bb8 manager opening redis connections for the session store
pub struct RedisConnector {
    client: redis::Client,
    connection_config: AsyncConnectionConfig,
    client_name: Option<String>,
}

impl RedisConnector {
    pub fn new(config: &StoreConfig) -> SessionResult<Self> {
        // The client's built-in defaults are shorter than ours; replace them.
        let connection_config = AsyncConnectionConfig::new()
            .set_connection_timeout(Some(config.connection_timeout()))
            .set_response_timeout(Some(config.socket_timeout()));

        Ok(Self {
            client: open_client(config)?,
            connection_config,
            client_name: config.client_name().map(str::to_string),
        })
    }
}

impl bb8::ManageConnection for RedisConnector {
    type Connection = SessionConnection;
    type Error = SessionError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let mut inner = self
            .client
            .get_multiplexed_async_connection_with_config(&self.connection_config)
            .await?;

        if let Some(name) = &self.client_name {
            let _: () = redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(name)
                .query_async(&mut inner)
                .await?;
        }

        Ok(SessionConnection {
            inner,
            broken: false,
        })
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        let pong: String = redis::cmd("PING").query_async(&mut conn.inner).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(SessionError::Decode(format!("unexpected PING reply {}", pong)))
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.broken
    }
}

/// Keeps the most recent connect failure so a checkout that timed out
/// waiting on it can report the real cause.
#[derive(Debug, Clone, Default)]
struct ConnectFailures(Arc<Mutex<Option<(Instant, SessionError)>>>);

impl ConnectFailures {
    /// The failure recorded at or after `since`, if any.
    fn take_since(&self, since: Instant) -> Option<SessionError> {
        match self.0.lock().take() {
            Some((at, err)) if at >= since => Some(err),
            _ => None,
        }
    }
}

impl ErrorSink<SessionError> for ConnectFailures {
    fn sink(&self, error: SessionError) {
        warn!(error = %error, "redis connect failed");
        *self.0.lock() = Some((Instant::now(), error));
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<SessionError>> {
        Box::new(self.clone())
    }
}

#[cfg(feature = "tls")]
fn open_client(config: &StoreConfig) -> SessionResult<redis::Client> {
    let url = config.connection_url();
    let client = match config.tls_material() {
        Some(material) => {
            let client_tls = match (&material.client_cert, &material.client_key) {
                (Some(cert), Some(key)) => Some(redis::ClientTlsConfig {
                    client_cert: cert.clone(),
                    client_key: key.clone(),
                }),
                _ => None,
            };
            redis::Client::build_with_tls(
                url,
                redis::TlsCertificates {
                    client_tls,
                    root_cert: material.root_cert.clone(),
                },
            )
        }
        None => redis::Client::open(url),
    };
    client.map_err(|e| SessionError::Config(format!("redis client: {}", e)))
}

#[cfg(not(feature = "tls"))]
fn open_client(config: &StoreConfig) -> SessionResult<redis::Client> {
    redis::Client::open(config.connection_url())
        .map_err(|e| SessionError::Config(format!("redis client: {}", e)))
}

/// Snapshot of pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Bounded pool of redis connections
#[derive(Clone)]
pub struct SessionPool {
    pool: Pool<RedisConnector>,
    connect_failures: ConnectFailures,
    socket_timeout: Duration,
}

impl SessionPool {
    /// Build the pool without opening any connection.
    ///
    /// Must be called inside a tokio runtime: bb8 spawns its idle
    /// maintenance tasks on the current runtime.
    pub fn new(config: &StoreConfig) -> SessionResult<Self> {
        let manager = RedisConnector::new(config)?;
        let connect_failures = ConnectFailures::default();

        // bb8 has no max-idle bound; reaping surplus idle connections is the
        // closest equivalent.
        let idle_timeout =
            (config.max_idle() < config.max_total()).then(|| config.idle_timeout());

        let pool = Pool::builder()
            .max_size(config.max_total())
            .min_idle((config.min_idle() > 0).then_some(config.min_idle()))
            .idle_timeout(idle_timeout)
            .connection_timeout(config.connection_timeout())
            .retry_connection(false)
            .test_on_check_out(false)
            .error_sink(Box::new(connect_failures.clone()))
            .build_unchecked(manager);

        info!(
            host = %config.host(),
            port = config.port(),
            database = config.database(),
            tls = config.tls(),
            max_total = config.max_total(),
            min_idle = config.min_idle(),
            "Redis session pool created"
        );

        Ok(Self {
            pool,
            connect_failures,
            socket_timeout: config.socket_timeout(),
        })
    }

    /// Borrow a connection, run `f` on it and return the connection.
    ///
    /// Transport failures and timeouts mark the connection broken so the pool
    /// replaces it. Errors are never retried here.
    pub async fn with_connection<T, F>(&self, f: F) -> SessionResult<T>
    where
        F: for<'c> FnOnce(&'c mut MultiplexedConnection) -> BoxFuture<'c, redis::RedisResult<T>>,
    {
        let checkout_started = Instant::now();
        let mut conn = self.pool.get().await.map_err(|e| match e {
            RunError::User(err) => err,
            RunError::TimedOut => self
                .connect_failures
                .take_since(checkout_started)
                .unwrap_or(SessionError::Timeout("connection checkout")),
        })?;

        let timed_out = || {
            warn!(
                timeout_ms = self.socket_timeout.as_millis() as u64,
                "redis command timed out, discarding connection"
            );
            SessionError::Timeout("socket")
        };

        match tokio::time::timeout(self.socket_timeout, f(&mut conn.inner)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.is_timeout() => {
                conn.broken = true;
                Err(timed_out())
            }
            Ok(Err(err)) => {
                if err.is_io_error() || err.is_connection_dropped() {
                    warn!(error = %err, "discarding broken redis connection");
                    conn.broken = true;
                }
                Err(err.into())
            }
            Err(_) => {
                conn.broken = true;
                Err(timed_out())
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}
