//! Push Payload Codec
//!
//! Every data push carries its payload as a JSON string literal wrapping
//! base64 of a raw DEFLATE stream of UTF-8 JSON. Decoding runs in three
//! stages, each with its own error variant:
//!
//! 1. strip quote characters and base64-decode (standard alphabet, padded)
//! 2. inflate the raw deflate stream (the server strips the zlib header)
//! 3. parse the inflated JSON into the feed's event type
//!
//! Some payloads still carry the 4-byte adler32 trailer and some do not.
//! Inflation stops at the final deflate block, so both forms decode.

use std::io::{self, ErrorKind, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::domain::events::FeedEvent;

/// Decode errors, one per pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not valid base64.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes are not a valid deflate stream.
    #[error("inflate failed: {0}")]
    Inflate(#[source] std::io::Error),

    /// Inflated text does not match the event schema.
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    /// Pipeline stage label used in logs and metrics.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Base64(_) => "base64",
            Self::Inflate(_) => "inflate",
            Self::Json(_) => "json",
        }
    }
}

/// Decode one push payload into `E`.
///
/// # Errors
///
/// Returns the first stage that failed. Nothing is retried.
pub fn decode<E: FeedEvent>(payload: &str) -> Result<E, DecodeError> {
    let compressed = decode_base64(payload)?;
    let json = inflate(&compressed)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Stage 1: strip `"` characters and base64-decode.
///
/// # Errors
///
/// Returns [`DecodeError::Base64`] on invalid input.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let unquoted: String = payload.chars().filter(|c| *c != '"').collect();
    Ok(STANDARD.decode(unquoted.trim())?)
}

/// Stage 2: inflate a headerless deflate stream.
///
/// # Errors
///
/// Returns [`DecodeError::Inflate`] if the stream is corrupt or yields
/// nothing before ending.
pub fn inflate(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = DeflateDecoder::new(raw);
    let mut out = Vec::with_capacity(raw.len() * 4);

    decoder.read_to_end(&mut out).map_err(DecodeError::Inflate)?;
    if out.is_empty() {
        return Err(DecodeError::Inflate(io::Error::new(
            ErrorKind::UnexpectedEof,
            "deflate stream produced no output",
        )));
    }
    Ok(out)
}

/// Encode `json` the way the hub does: raw deflate, base64, quoted.
///
/// The inverse of [`decode`], used to build pushes for in-memory transports.
///
/// # Errors
///
/// Returns [`DecodeError::Inflate`] if the compressor fails.
pub fn encode(json: &[u8]) -> Result<String, DecodeError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json).map_err(DecodeError::Inflate)?;
    let raw = encoder.finish().map_err(DecodeError::Inflate)?;
    Ok(format!("\"{}\"", STANDARD.encode(raw)))
}
