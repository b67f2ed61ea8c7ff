//! Self-describing frame
//!
//! Layout: `created | accessed | last_accessed | max_inactive_ms` as four
//! big-endian `i64`s, followed by the attribute blob. With compression on the
//! whole frame is run through the compression filter.

use super::attributes::{AttributeSerializer, JsonAttributeSerializer};
use super::compression::{compress, decompress, CompressionMode};
use super::SessionCodec;
use crate::error::{SessionError, SessionResult};
use crate::session::{SessionContext, SessionRecord};

/// Size of the four fixed time fields.
pub const TIME_FIELDS_LEN: usize = 4 * 8;

/// Codec writing the four time fields followed by an attribute blob
pub struct FramedCodec<S = JsonAttributeSerializer> {
    attributes: S,
    compression: Option<CompressionMode>,
}

impl FramedCodec {
    pub fn new(compression: Option<CompressionMode>) -> Self {
        Self::with_serializer(JsonAttributeSerializer, compression)
    }
}

impl<S: AttributeSerializer> FramedCodec<S> {
    pub fn with_serializer(attributes: S, compression: Option<CompressionMode>) -> Self {
        Self {
            attributes,
            compression,
        }
    }
}

impl<S: AttributeSerializer> SessionCodec for FramedCodec<S> {
    fn encode(&self, record: &SessionRecord) -> SessionResult<Vec<u8>> {
        let blob = self.attributes.serialize(&record.attributes)?;

        let mut frame = Vec::with_capacity(TIME_FIELDS_LEN + blob.len());
        for field in [
            record.created,
            record.accessed,
            record.last_accessed,
            record.max_inactive_ms,
        ] {
            frame.extend_from_slice(&field.to_be_bytes());
        }
        frame.extend_from_slice(&blob);

        match self.compression {
            Some(mode) => compress(mode, &frame),
            None => Ok(frame),
        }
    }

    fn decode(
        &self,
        id: &str,
        context: &SessionContext,
        payload: &[u8],
    ) -> SessionResult<SessionRecord> {
        let inflated;
        let frame = match self.compression {
            Some(mode) => {
                inflated = decompress(mode, payload)?;
                &inflated[..]
            }
            None => payload,
        };

        if frame.len() < TIME_FIELDS_LEN {
            return Err(SessionError::Decode(format!(
                "frame of {} bytes is shorter than the {} byte header",
                frame.len(),
                TIME_FIELDS_LEN
            )));
        }

        let (header, blob) = frame.split_at(TIME_FIELDS_LEN);
        let field = |index: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&header[index * 8..(index + 1) * 8]);
            i64::from_be_bytes(bytes)
        };

        let mut record =
            SessionRecord::new(id, context.clone(), field(0), field(1), field(2), field(3));
        record.attributes = self.attributes.deserialize(blob)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SessionRecord {
        let mut record = SessionRecord::new(
            "node0abc",
            SessionContext::new("/", "0.0.0.0"),
            1_700_000_000_000,
            1_700_000_100_000,
            1_700_000_050_000,
            1_800_000,
        );
        record.set("val", "42");
        record.set("greeting", "こんにちは");
        record.set("nested", json!({"a": [true, null, 1.5]}));
        record
    }

    #[test]
    fn test_layout_without_compression() {
        let record = sample();
        let bytes = FramedCodec::new(None).encode(&record).unwrap();

        assert_eq!(&bytes[0..8], &record.created.to_be_bytes());
        assert_eq!(&bytes[8..16], &record.accessed.to_be_bytes());
        assert_eq!(&bytes[16..24], &record.last_accessed.to_be_bytes());
        assert_eq!(&bytes[24..32], &record.max_inactive_ms.to_be_bytes());
        assert_eq!(bytes[32], b'{');
    }

    #[test]
    fn test_round_trip_all_compression_settings() {
        let record = sample();
        for compression in [None, Some(CompressionMode::Zip), Some(CompressionMode::Gzip)] {
            let codec = FramedCodec::new(compression);
            let bytes = codec.encode(&record).unwrap();
            let decoded = codec.decode(&record.id, &record.context, &bytes).unwrap();
            assert_eq!(decoded, record, "compression {:?}", compression);
        }
    }

    #[test]
    fn test_round_trip_empty_attributes() {
        let record = SessionRecord::new("empty", SessionContext::default(), 1, 2, 3, -1);
        let codec = FramedCodec::new(Some(CompressionMode::Zip));
        let bytes = codec.encode(&record).unwrap();
        let decoded = codec.decode("empty", &SessionContext::default(), &bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_stamps_given_identity() {
        let record = sample();
        let codec = FramedCodec::new(None);
        let bytes = codec.encode(&record).unwrap();
        let context = SessionContext::new("/other", "example.org");
        let decoded = codec.decode("renamed", &context, &bytes).unwrap();
        assert_eq!(decoded.id, "renamed");
        assert_eq!(decoded.context, context);
    }

    #[test]
    fn test_short_frame_is_corrupt() {
        let codec = FramedCodec::new(None);
        let err = codec
            .decode("x", &SessionContext::default(), &[0u8; 31])
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_short_frame_after_inflate_is_corrupt() {
        let packed = compress(CompressionMode::Zip, &[0u8; 16]).unwrap();
        let codec = FramedCodec::new(Some(CompressionMode::Zip));
        let err = codec
            .decode("x", &SessionContext::default(), &packed)
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_uncompressed_payload_rejected_by_compressed_codec() {
        let bytes = FramedCodec::new(None).encode(&sample()).unwrap();
        let codec = FramedCodec::new(Some(CompressionMode::Zip));
        assert!(codec.decode("x", &SessionContext::default(), &bytes).is_err());
    }
}
