//! Snapshot Codec
//!
//! Length-prefixed binary encoding of a key/value mapping. All integers are
//! big-endian.
//!
//! ```text
//! magic    4 bytes   "TTLC"
//! version  u8        1
//! count    u32       number of records
//! record   key_len u32 | key (UTF-8) | value_len u32 | value (UTF-8)
//! checksum u32       CRC-32 (IEEE) of every preceding byte
//! ```

use std::collections::HashSet;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CacheError, Result};

/// File signature.
pub const MAGIC: &[u8; 4] = b"TTLC";
/// Current format version.
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1 + 4;
const CHECKSUM_LEN: usize = 4;

// == Encode ==
/// Encodes key/value pairs into a snapshot image.
pub fn encode(entries: &[(String, String)]) -> Result<Bytes> {
    let body_len: usize = entries
        .iter()
        .map(|(key, value)| 8 + key.len() + value.len())
        .sum();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len + CHECKSUM_LEN);

    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u32(length_prefix(entries.len(), "record count")?);

    for (key, value) in entries {
        put_field(&mut buf, key, "key")?;
        put_field(&mut buf, value, "value")?;
    }

    let checksum = crc32fast::hash(&buf);
    buf.put_u32(checksum);
    Ok(buf.freeze())
}

fn put_field(buf: &mut BytesMut, field: &str, what: &str) -> Result<()> {
    buf.put_u32(length_prefix(field.len(), what)?);
    buf.put_slice(field.as_bytes());
    Ok(())
}

fn length_prefix(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| CacheError::Format(format!("{what} too large to encode")))
}

// == Decode ==
/// Decodes a snapshot image, validating it completely before returning.
pub fn decode(data: &[u8]) -> Result<Vec<(String, String)>> {
    if data.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(format_error("snapshot is too short"));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(format_error("not a snapshot file (bad magic)"));
    }

    let (body, mut trailer) = data.split_at(data.len() - CHECKSUM_LEN);
    let expected = trailer.get_u32();
    let actual = crc32fast::hash(body);
    if expected != actual {
        return Err(CacheError::Format(format!(
            "checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
        )));
    }

    let mut buf = &body[MAGIC.len()..];
    let version = buf.get_u8();
    if version != VERSION {
        return Err(CacheError::Format(format!(
            "unsupported snapshot version {version}"
        )));
    }

    let count = buf.get_u32() as usize;
    // Each record needs at least two length prefixes.
    let mut entries = Vec::with_capacity(count.min(buf.remaining() / 8));
    let mut seen = HashSet::with_capacity(entries.capacity());

    for _ in 0..count {
        let key = take_string(&mut buf, "key")?;
        let value = take_string(&mut buf, "value")?;
        if !seen.insert(key.clone()) {
            return Err(CacheError::Format(format!("duplicate key {key:?}")));
        }
        entries.push((key, value));
    }

    if buf.has_remaining() {
        return Err(CacheError::Format(format!(
            "{} trailing bytes after {count} records",
            buf.remaining()
        )));
    }
    Ok(entries)
}

fn take_string(buf: &mut &[u8], what: &str) -> Result<String> {
    if buf.remaining() < 4 {
        return Err(CacheError::Format(format!("truncated {what} length")));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(CacheError::Format(format!("truncated {what}")));
    }

    let text = String::from_utf8(buf[..len].to_vec())
        .map_err(|_| CacheError::Format(format!("{what} is not valid UTF-8")))?;
    buf.advance(len);
    Ok(text)
}

fn format_error(msg: &str) -> CacheError {
    CacheError::Format(msg.to_string())
}
