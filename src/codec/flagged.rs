//! Flag-tagged frame
//!
//! Layout: a 4-byte big-endian flag word followed by the blob produced by a
//! [`Transcoder`]. The flag word tells the transcoder how the blob was
//! encoded, so compressed and plain payloads can live side by side.

use serde::{Deserialize, Serialize};

use super::compression::{compress, decompress, CompressionMode};
use super::SessionCodec;
use crate::error::{SessionError, SessionResult};
use crate::session::{Attributes, SessionContext, SessionRecord};

/// Length of the flag header.
pub const FLAG_HEADER_LEN: usize = 4;

/// Blob holds a serialized session record.
pub const SERIALIZED: u32 = 1;
/// Blob was passed through the compression filter.
pub const COMPRESSED: u32 = 1 << 1;
/// Compressed blob is a gzip stream rather than zlib. Only valid with
/// [`COMPRESSED`].
pub const GZIP: u32 = 1 << 2;

const KNOWN_FLAGS: u32 = SERIALIZED | COMPRESSED | GZIP;

fn compression_flags(mode: CompressionMode) -> u32 {
    match mode {
        CompressionMode::Gzip => COMPRESSED | GZIP,
        CompressionMode::Zip => COMPRESSED,
    }
}

/// Encoded blob plus the flags describing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedData {
    pub flags: u32,
    pub data: Vec<u8>,
}

/// Serializes a whole session record into one blob tagged with flags
pub trait Transcoder: Send + Sync + 'static {
    fn encode(&self, record: &SessionRecord) -> SessionResult<CachedData>;

    fn decode(
        &self,
        id: &str,
        context: &SessionContext,
        data: CachedData,
    ) -> SessionResult<SessionRecord>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecordRef<'a> {
    created: i64,
    accessed: i64,
    last_accessed: i64,
    max_inactive_ms: i64,
    attributes: &'a Attributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    created: i64,
    accessed: i64,
    last_accessed: i64,
    max_inactive_ms: i64,
    #[serde(default)]
    attributes: Attributes,
}

/// JSON transcoder that compresses blobs larger than a threshold
#[derive(Debug, Clone)]
pub struct SerializingTranscoder {
    compression: Option<CompressionMode>,
    threshold: usize,
}

impl SerializingTranscoder {
    /// `compression` of `None` never compresses; otherwise blobs longer than
    /// `threshold` bytes are compressed with the given mode.
    pub fn new(compression: Option<CompressionMode>, threshold: usize) -> Self {
        Self {
            compression,
            threshold,
        }
    }
}

impl Default for SerializingTranscoder {
    fn default() -> Self {
        Self::new(None, 16 * 1024)
    }
}

impl Transcoder for SerializingTranscoder {
    fn encode(&self, record: &SessionRecord) -> SessionResult<CachedData> {
        let stored = StoredRecordRef {
            created: record.created,
            accessed: record.accessed,
            last_accessed: record.last_accessed,
            max_inactive_ms: record.max_inactive_ms,
            attributes: &record.attributes,
        };
        let data =
            serde_json::to_vec(&stored).map_err(|e| SessionError::Serialization(e.to_string()))?;

        match self.compression {
            Some(mode) if data.len() > self.threshold => Ok(CachedData {
                flags: SERIALIZED | compression_flags(mode),
                data: compress(mode, &data)?,
            }),
            _ => Ok(CachedData {
                flags: SERIALIZED,
                data,
            }),
        }
    }

    fn decode(
        &self,
        id: &str,
        context: &SessionContext,
        data: CachedData,
    ) -> SessionResult<SessionRecord> {
        let unknown = data.flags & !KNOWN_FLAGS;
        if unknown != 0 {
            return Err(SessionError::Decode(format!(
                "unknown flag bits {:#010x}",
                unknown
            )));
        }
        if data.flags & SERIALIZED == 0 {
            return Err(SessionError::Decode(format!(
                "flags {:#010x} do not describe a serialized session",
                data.flags
            )));
        }

        // The mode travels in the flag word, so any reader can inflate.
        let blob = match (data.flags & COMPRESSED != 0, data.flags & GZIP != 0) {
            (true, true) => decompress(CompressionMode::Gzip, &data.data)?,
            (true, false) => decompress(CompressionMode::Zip, &data.data)?,
            (false, true) => {
                return Err(SessionError::Decode(format!(
                    "flags {:#010x} mark gzip without compression",
                    data.flags
                )))
            }
            (false, false) => data.data,
        };

        let stored: StoredRecord = serde_json::from_slice(&blob)
            .map_err(|e| SessionError::Decode(format!("session blob: {}", e)))?;

        let mut record = SessionRecord::new(
            id,
            context.clone(),
            stored.created,
            stored.accessed,
            stored.last_accessed,
            stored.max_inactive_ms,
        );
        record.attributes = stored.attributes;
        Ok(record)
    }
}

/// Codec writing `flags (u32 BE) | blob`
pub struct FlaggedCodec<T = SerializingTranscoder> {
    transcoder: T,
}

impl<T: Transcoder> FlaggedCodec<T> {
    pub fn new(transcoder: T) -> Self {
        Self { transcoder }
    }
}

impl<T: Transcoder> SessionCodec for FlaggedCodec<T> {
    fn encode(&self, record: &SessionRecord) -> SessionResult<Vec<u8>> {
        let CachedData { flags, data } = self.transcoder.encode(record)?;
        let mut payload = Vec::with_capacity(FLAG_HEADER_LEN + data.len());
        payload.extend_from_slice(&flags.to_be_bytes());
        payload.extend_from_slice(&data);
        Ok(payload)
    }

    /// Payloads shorter than the flag header are rejected here; the stores
    /// treat them as absent before ever calling the codec.
    fn decode(
        &self,
        id: &str,
        context: &SessionContext,
        payload: &[u8],
    ) -> SessionResult<SessionRecord> {
        if payload.len() < FLAG_HEADER_LEN {
            return Err(SessionError::Decode(format!(
                "payload of {} bytes has no flag header",
                payload.len()
            )));
        }
        let (header, blob) = payload.split_at(FLAG_HEADER_LEN);
        let mut flags = [0u8; FLAG_HEADER_LEN];
        flags.copy_from_slice(header);

        self.transcoder.decode(
            id,
            context,
            CachedData {
                flags: u32::from_be_bytes(flags),
                data: blob.to_vec(),
            },
        )
    }
}
