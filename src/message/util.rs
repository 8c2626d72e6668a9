//! Utility functions intended for use within the [`crate::message`] module.

use super::error::{Error, Result};

/// Read a little-endian `u64` from the start of a byte slice, returning it
/// along with the unread remainder.
pub fn read_u64(bytes: &[u8]) -> Result<(u64, &[u8])> {
    if bytes.len() < 8 {
        return Err(Error::Malformed(format!(
            "expected at least 8 bytes, found {}",
            bytes.len()
        )));
    }
    let (head, rest) = bytes.split_at(8);
    let mut raw = [0; 8];
    raw.copy_from_slice(head);
    Ok((u64::from_le_bytes(raw), rest))
}

/// Read a little-endian `i64` that must make up the whole slice.
pub fn read_i64_exact(bytes: &[u8]) -> Result<i64> {
    let (value, rest) = read_u64(bytes)?;
    if !rest.is_empty() {
        return Err(Error::Malformed(format!(
            "{} trailing bytes after an integer",
            rest.len()
        )));
    }
    Ok(value as i64)
}

/// Append a little-endian `u64` to a buffer.
pub fn write_u64(buffer: &mut Vec<u8>, value: u64) {
    buffer.extend_from_slice(&value.to_le_bytes())
}
