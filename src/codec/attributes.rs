//! Pluggable attribute blob serialization

use crate::error::{SessionError, SessionResult};
use crate::session::Attributes;

/// Turns a session's attribute map into an opaque blob and back
pub trait AttributeSerializer: Send + Sync + 'static {
    fn serialize(&self, attributes: &Attributes) -> SessionResult<Vec<u8>>;

    fn deserialize(&self, blob: &[u8]) -> SessionResult<Attributes>;
}

/// Attribute serializer writing a JSON object
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAttributeSerializer;

impl AttributeSerializer for JsonAttributeSerializer {
    fn serialize(&self, attributes: &Attributes) -> SessionResult<Vec<u8>> {
        serde_json::to_vec(attributes).map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn deserialize(&self, blob: &[u8]) -> SessionResult<Attributes> {
        serde_json::from_slice(blob)
            .map_err(|e| SessionError::Decode(format!("attribute blob: {}", e)))
    }
}
