//! Cache Entry Module
//!
//! Encodes a value together with its absolute expiration time.
//!
//! # Format
//! ```text
//! <expires_at as decimal unix seconds>\n
//! <serde_json payload>
//! ```
//! The header line can be read without touching the payload, which keeps
//! expiry checks and sweeps O(1) per file.

use std::io::{BufRead, Read};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;

/// Longest header line accepted (sign + 19 digits + newline, with slack)
const MAX_HEADER_LEN: usize = 32;

// == Codec Error ==
/// Reasons stored bytes could not be turned back into an entry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Header missing, not numeric, or payload not valid for the requested type
    #[error("corrupt entry: {0}")]
    Corrupt(String),

    /// Header present but no payload follows
    #[error("entry has no payload")]
    MissingPayload,
}

// == Cache Entry ==
/// A decoded value with its expiration timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, expires_at: i64) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once `now` reaches `expires_at`, so a timestamp
    /// equal to `now` is already invisible.
    pub fn is_expired(&self, now: i64) -> bool {
        is_expired(self.expires_at, now)
    }
}

impl<T: Serialize> CacheEntry<T> {
    /// Serializes header and payload into one byte stream.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.value, self.expires_at)
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    /// Parses a full entry file.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, CodecError> {
        let newline = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| CodecError::Corrupt("missing header line".to_string()))?;
        let expires_at = parse_header(&bytes[..newline])?;
        let value = decode_payload(&bytes[newline + 1..])?;
        Ok(Self { value, expires_at })
    }
}

/// Expiration rule shared by reads and sweeps.
pub fn is_expired(expires_at: i64, now: i64) -> bool {
    now >= expires_at
}

/// Serializes `value` with an `expires_at` header.
pub fn encode<T: Serialize + ?Sized>(value: &T, expires_at: i64) -> Result<Vec<u8>> {
    let mut bytes = format!("{expires_at}\n").into_bytes();
    serde_json::to_writer(&mut bytes, value)?;
    Ok(bytes)
}

/// Reads only the header line, leaving `reader` positioned at the payload.
pub fn read_expires_at<R: BufRead>(reader: &mut R) -> std::io::Result<std::result::Result<i64, CodecError>> {
    let mut line = Vec::with_capacity(MAX_HEADER_LEN);
    let read = Read::take(reader, MAX_HEADER_LEN as u64).read_until(b'\n', &mut line)?;

    if read == 0 || line.last() != Some(&b'\n') {
        return Ok(Err(CodecError::Corrupt("missing header line".to_string())));
    }
    line.pop();
    Ok(parse_header(&line))
}

/// Decodes payload bytes that follow the header.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> std::result::Result<T, CodecError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::MissingPayload);
    }
    serde_json::from_slice(payload).map_err(|e| CodecError::Corrupt(e.to_string()))
}

fn parse_header(line: &[u8]) -> std::result::Result<i64, CodecError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.trim_end_matches('\r').parse::<i64>().ok())
        .ok_or_else(|| CodecError::Corrupt("invalid expiration header".to_string()))
}
