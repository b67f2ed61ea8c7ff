//! Session payload codecs
//!
//! Two byte layouts are supported. Nothing in a stored payload says which
//! layout produced it, so the layout is chosen per deployment through
//! [`PayloadFormat`] and every store sharing a key space must agree on it.

mod attributes;
mod compression;
mod flagged;
mod framed;

use std::sync::Arc;

pub use attributes::{AttributeSerializer, JsonAttributeSerializer};
pub use compression::{compress, decompress, CompressionMode};
pub use flagged::{
    CachedData, FlaggedCodec, SerializingTranscoder, Transcoder, COMPRESSED, FLAG_HEADER_LEN,
    GZIP, SERIALIZED,
};
pub use framed::{FramedCodec, TIME_FIELDS_LEN};

use crate::config::StoreConfig;
use crate::error::SessionResult;
use crate::session::{SessionContext, SessionRecord};

/// Payloads shorter than this are treated as "no session" on load.
pub const MIN_PAYLOAD_LEN: usize = 4;

/// Byte layout used for stored sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    /// Four big-endian time fields followed by the attribute blob
    #[default]
    Framed,
    /// 4-byte flag header followed by a transcoded blob
    Flagged,
}

/// Converts a session record to and from its stored bytes
pub trait SessionCodec: Send + Sync + 'static {
    fn encode(&self, record: &SessionRecord) -> SessionResult<Vec<u8>>;

    /// Rebuild a record from `payload`, stamping it with `id` and `context`.
    fn decode(
        &self,
        id: &str,
        context: &SessionContext,
        payload: &[u8],
    ) -> SessionResult<SessionRecord>;
}

/// Build the codec selected by `config`.
pub fn codec_for(config: &StoreConfig) -> Arc<dyn SessionCodec> {
    let compression = config.compression().then(|| config.compression_mode());
    match config.format() {
        PayloadFormat::Framed => Arc::new(FramedCodec::new(compression)),
        PayloadFormat::Flagged => Arc::new(FlaggedCodec::new(SerializingTranscoder::new(
            compression,
            config.compression_threshold(),
        ))),
    }
}
