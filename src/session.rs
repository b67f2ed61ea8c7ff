//! Session record persisted by the store

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Attribute map carried by a session
pub type Attributes = HashMap<String, Value>;

/// Identity of the web context a session belongs to.
///
/// Supplied by the host at initialize time and stamped onto every record the
/// store loads; it is never written to the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Canonical context path, e.g. `/` or `/shop`
    pub canonical_path: String,
    /// Virtual host the context is deployed on
    pub vhost: String,
}

impl SessionContext {
    pub fn new(canonical_path: impl Into<String>, vhost: impl Into<String>) -> Self {
        Self {
            canonical_path: canonical_path.into(),
            vhost: vhost.into(),
        }
    }
}

/// State of one user session.
///
/// All times are milliseconds since the Unix epoch; `max_inactive_ms` is a
/// duration in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub context: SessionContext,
    pub created: i64,
    pub accessed: i64,
    pub last_accessed: i64,
    pub max_inactive_ms: i64,
    pub attributes: Attributes,
}

impl SessionRecord {
    pub fn new(
        id: impl Into<String>,
        context: SessionContext,
        created: i64,
        accessed: i64,
        last_accessed: i64,
        max_inactive_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            context,
            created,
            accessed,
            last_accessed,
            max_inactive_ms,
            attributes: Attributes::new(),
        }
    }

    /// Create a record whose timestamps are all "now"
    pub fn fresh(id: impl Into<String>, context: SessionContext, max_inactive_ms: i64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self::new(id, context, now, now, now, max_inactive_ms)
    }

    /// Get a typed attribute value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set an attribute value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.attributes.insert(key.to_string(), v);
        }
    }

    /// Remove an attribute value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Check if the session has no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
