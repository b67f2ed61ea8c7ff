//! Lossless compression filters for stored payloads

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::{self, Read, Write};

use crate::error::{SessionError, SessionResult};

/// Compression stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Gzip stream
    Gzip,
    /// Zlib deflate stream
    #[default]
    Zip,
}

/// Compress `data` with the given stream format
pub fn compress(mode: CompressionMode, data: &[u8]) -> SessionResult<Vec<u8>> {
    let out = Vec::with_capacity(data.len() / 2 + 16);
    let result = match mode {
        CompressionMode::Gzip => finish_gzip(GzEncoder::new(out, Compression::default()), data),
        CompressionMode::Zip => finish_zlib(ZlibEncoder::new(out, Compression::default()), data),
    };
    result.map_err(|e| SessionError::Serialization(format!("compression failed: {}", e)))
}

fn finish_gzip(mut encoder: GzEncoder<Vec<u8>>, data: &[u8]) -> io::Result<Vec<u8>> {
    encoder.write_all(data)?;
    encoder.finish()
}

fn finish_zlib(mut encoder: ZlibEncoder<Vec<u8>>, data: &[u8]) -> io::Result<Vec<u8>> {
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate `data`; a stream that does not match `mode` is a decode error
pub fn decompress(mode: CompressionMode, data: &[u8]) -> SessionResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let result = match mode {
        CompressionMode::Gzip => GzDecoder::new(data).read_to_end(&mut out),
        CompressionMode::Zip => ZlibDecoder::new(data).read_to_end(&mut out),
    };
    result
        .map(|_| out)
        .map_err(|e| SessionError::Decode(format!("decompression failed: {}", e)))
}
