//! Store configuration
//!
//! A [`StoreConfig`] is assembled once with [`StoreConfigBuilder`] and is
//! immutable afterwards. Discrete connection fields and the connection URI are
//! two views of the same settings: setting the URI fills host, port, password,
//! database and TLS, and [`StoreConfig::url`] renders them back.

use std::time::Duration;

use url::Url;

use crate::codec::{CompressionMode, PayloadFormat};
use crate::error::{SessionError, SessionResult};

/// Default redis host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default redis port.
pub const DEFAULT_PORT: u16 = 6379;
/// Default connect and socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
/// Default logical database.
pub const DEFAULT_DATABASE: u32 = 0;

const PLAIN_SCHEME: &str = "redis";
const TLS_SCHEME: &str = "rediss";

/// PEM encoded certificates used for TLS connections
#[derive(Clone, Default)]
pub struct TlsMaterial {
    /// Root certificate used to verify the server
    pub root_cert: Option<Vec<u8>>,
    /// Client certificate for mutual TLS
    pub client_cert: Option<Vec<u8>>,
    /// Private key matching `client_cert`
    pub client_key: Option<Vec<u8>>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("root_cert", &self.root_cert.as_ref().map(Vec::len))
            .field("client_cert", &self.client_cert.as_ref().map(Vec::len))
            .field("client_key", &self.client_key.is_some())
            .finish()
    }
}

/// Validated configuration for a redis session store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    host: String,
    port: u16,
    connection_timeout: Duration,
    socket_timeout: Duration,
    password: Option<String>,
    database: u32,
    client_name: Option<String>,
    tls: bool,
    tls_material: Option<TlsMaterial>,
    verify_hostname: bool,
    max_idle: u32,
    min_idle: u32,
    max_total: u32,
    idle_timeout: Duration,
    key_prefix: Option<String>,
    expiry_secs: i64,
    compression: bool,
    compression_mode: CompressionMode,
    compression_threshold: usize,
    format: PayloadFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connection_timeout: DEFAULT_TIMEOUT,
            socket_timeout: DEFAULT_TIMEOUT,
            password: None,
            database: DEFAULT_DATABASE,
            client_name: None,
            tls: false,
            tls_material: None,
            verify_hostname: true,
            // commons-pool style defaults
            max_idle: 8,
            min_idle: 0,
            max_total: 8,
            idle_timeout: Duration::from_secs(60),
            key_prefix: None,
            expiry_secs: 0,
            compression: false,
            compression_mode: CompressionMode::Zip,
            compression_threshold: 16 * 1024,
            format: PayloadFormat::Framed,
        }
    }
}

impl StoreConfig {
    /// Start a builder with default settings
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }

    /// Start a builder populated from a `redis://` or `rediss://` URI
    pub fn from_url(url: &str) -> SessionResult<StoreConfigBuilder> {
        StoreConfigBuilder::new().url(url)
    }

    /// Start a builder populated from `SESSION_REDIS_*` environment variables.
    ///
    /// Recognised variables: `SESSION_REDIS_URL`, `SESSION_REDIS_KEY_PREFIX`,
    /// `SESSION_REDIS_EXPIRY_SECS`, `SESSION_REDIS_COMPRESSION` and
    /// `SESSION_REDIS_MAX_TOTAL`.
    pub fn from_env() -> SessionResult<StoreConfigBuilder> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> SessionResult<StoreConfigBuilder>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = StoreConfigBuilder::new();

        if let Some(url) = lookup("SESSION_REDIS_URL") {
            builder = builder.url(&url)?;
        }

        if let Some(prefix) = lookup("SESSION_REDIS_KEY_PREFIX") {
            builder = builder.key_prefix(prefix);
        }

        if let Some(expiry) = lookup("SESSION_REDIS_EXPIRY_SECS") {
            let secs = expiry.trim().parse().map_err(|_| {
                SessionError::Config(format!("SESSION_REDIS_EXPIRY_SECS: {}", expiry))
            })?;
            builder = builder.expiry_secs(secs);
        }

        if let Some(flag) = lookup("SESSION_REDIS_COMPRESSION") {
            let enabled = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(SessionError::Config(format!(
                        "SESSION_REDIS_COMPRESSION: {}",
                        flag
                    )))
                }
            };
            builder = builder.compression(enabled);
        }

        if let Some(total) = lookup("SESSION_REDIS_MAX_TOTAL") {
            let total = total.trim().parse().map_err(|_| {
                SessionError::Config(format!("SESSION_REDIS_MAX_TOTAL: {}", total))
            })?;
            builder = builder.max_total(total);
        }

        Ok(builder)
    }

    /// Canonical connection URI: `scheme://[:password@]host:port[/database]`.
    ///
    /// The database segment is omitted for the default database.
    pub fn url(&self) -> String {
        let scheme = if self.tls { TLS_SCHEME } else { PLAIN_SCHEME };
        let auth = self
            .password
            .as_ref()
            .map(|p| format!(":{}@", urlencoding::encode(p)))
            .unwrap_or_default();
        let database = if self.database != DEFAULT_DATABASE {
            format!("/{}", self.database)
        } else {
            String::new()
        };
        format!("{}://{}{}:{}{}", scheme, auth, self.host, self.port, database)
    }

    /// URI handed to the redis client, including the insecure marker when
    /// hostname verification is disabled.
    pub(crate) fn connection_url(&self) -> String {
        let mut url = self.url();
        if self.tls && !self.verify_hostname {
            url.push_str("#insecure");
        }
        url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn database(&self) -> u32 {
        self.database
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn tls_material(&self) -> Option<&TlsMaterial> {
        self.tls_material.as_ref()
    }

    pub fn verify_hostname(&self) -> bool {
        self.verify_hostname
    }

    pub fn max_idle(&self) -> u32 {
        self.max_idle
    }

    pub fn min_idle(&self) -> u32 {
        self.min_idle
    }

    pub fn max_total(&self) -> u32 {
        self.max_total
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn key_prefix(&self) -> Option<&str> {
        self.key_prefix.as_deref()
    }

    /// Raw expiry setting; zero or negative means no expiry.
    pub fn expiry_secs(&self) -> i64 {
        self.expiry_secs
    }

    /// Time-to-live applied to stored records, if any.
    pub fn ttl(&self) -> Option<u64> {
        (self.expiry_secs > 0).then_some(self.expiry_secs as u64)
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn compression_mode(&self) -> CompressionMode {
        self.compression_mode
    }

    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }
}

/// Builder for [`StoreConfig`]
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set host, port, password, database and TLS from a URI.
    ///
    /// Only the `redis` and `rediss` schemes are accepted; `rediss` turns TLS on.
    pub fn url(mut self, url: &str) -> SessionResult<Self> {
        let parsed =
            Url::parse(url).map_err(|e| SessionError::Config(format!("Url: {}: {}", url, e)))?;

        let tls = match parsed.scheme() {
            PLAIN_SCHEME => false,
            TLS_SCHEME => true,
            other => {
                return Err(SessionError::Config(format!(
                    "Url: {}: unsupported scheme {}",
                    url, other
                )))
            }
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SessionError::Config(format!("Url: {}: missing host", url)))?;

        let password = match parsed.password() {
            Some(p) => Some(
                urlencoding::decode(p)
                    .map_err(|e| SessionError::Config(format!("Url: {}: {}", url, e)))?
                    .into_owned(),
            ),
            None => None,
        };

        let database = match parsed.path().trim_matches('/') {
            "" => DEFAULT_DATABASE,
            db => db.parse().map_err(|_| {
                SessionError::Config(format!("Url: {}: invalid database {}", url, db))
            })?,
        };

        self.config.host = host.to_string();
        self.config.port = parsed.port().unwrap_or(DEFAULT_PORT);
        self.config.password = password;
        self.config.database = database;
        self.config.tls = tls;
        Ok(self)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set host and port from their textual form, validating the port.
    pub fn address(self, host: &str, port: &str) -> SessionResult<Self> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| SessionError::Config(format!("Port: {}", port)))?;
        if port == 0 {
            return Err(SessionError::Config(format!("Port: {}", port)));
        }
        Ok(self.host(host).port(port))
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket_timeout = timeout;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: u32) -> Self {
        self.config.database = database;
        self
    }

    /// Name announced with `CLIENT SETNAME` on each new connection
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = Some(name.into());
        self
    }

    pub fn tls(mut self, enabled: bool) -> Self {
        self.config.tls = enabled;
        self
    }

    pub fn tls_material(mut self, material: TlsMaterial) -> Self {
        self.config.tls_material = Some(material);
        self
    }

    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.config.verify_hostname = verify;
        self
    }

    pub fn max_idle(mut self, max_idle: u32) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    pub fn min_idle(mut self, min_idle: u32) -> Self {
        self.config.min_idle = min_idle;
        self
    }

    pub fn max_total(mut self, max_total: u32) -> Self {
        self.config.max_total = max_total;
        self
    }

    /// How long a surplus idle connection lives when `max_idle < max_total`
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Prefix prepended verbatim to every session id
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = Some(prefix.into());
        self
    }

    /// Expiry in seconds; zero or negative stores records without a TTL
    pub fn expiry_secs(mut self, secs: i64) -> Self {
        self.config.expiry_secs = secs;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    pub fn compression_mode(mut self, mode: CompressionMode) -> Self {
        self.config.compression_mode = mode;
        self
    }

    /// Blob size above which the flagged format compresses
    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.config.compression_threshold = bytes;
        self
    }

    pub fn format(mut self, format: PayloadFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> SessionResult<StoreConfig> {
        let config = self.config;

        if config.host.trim().is_empty() {
            return Err(SessionError::Config("Host: empty".to_string()));
        }
        if config.port == 0 {
            return Err(SessionError::Config(format!("Port: {}", config.port)));
        }
        if config.connection_timeout.is_zero() || config.socket_timeout.is_zero() {
            return Err(SessionError::Config("timeouts must be non-zero".to_string()));
        }
        if config.max_total == 0 {
            return Err(SessionError::Config("max_total must be at least 1".to_string()));
        }
        if config.max_idle > config.max_total {
            return Err(SessionError::Config(format!(
                "max_idle {} exceeds max_total {}",
                config.max_idle, config.max_total
            )));
        }
        if config.min_idle > config.max_idle {
            return Err(SessionError::Config(format!(
                "min_idle {} exceeds max_idle {}",
                config.min_idle, config.max_idle
            )));
        }
        if let Some(material) = &config.tls_material {
            if !config.tls {
                return Err(SessionError::Config(
                    "TLS material supplied but TLS is disabled".to_string(),
                ));
            }
            if material.client_cert.is_some() != material.client_key.is_some() {
                return Err(SessionError::Config(
                    "client certificate and key must be supplied together".to_string(),
                ));
            }
        }
        if config.tls && !cfg!(feature = "tls") {
            return Err(SessionError::Config(
                "TLS requested but the crate was built without the `tls` feature".to_string(),
            ));
        }

        Ok(config)
    }
}
