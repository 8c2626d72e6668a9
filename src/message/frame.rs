//! Framing for generic-path messages.
//!
//! Every generic message starts with a one-byte kind. A data frame carries
//! the encoded value. The two marker frames stand in for a value that was
//! never sent, so that the receiver fails the same way the sender did
//! instead of waiting for data that is not coming.

use super::error::{Error, Result};
use super::util;

const DATA: u8 = 0;
const OVERSIZED: u8 = 1;
const MISSING: u8 = 2;

#[derive(Debug, PartialEq)]
pub enum Frame<'a> {
    /// An encoded value.
    Data(&'a [u8]),
    /// The sender's encoding was `len` bytes, over the transport limit.
    Oversized { len: usize },
    /// The sender had no value to send.
    Missing,
}

impl<'a> Frame<'a> {
    pub fn parse(message: &'a [u8]) -> Result<Self> {
        match message.split_first() {
            Some((&DATA, body)) => Ok(Frame::Data(body)),
            Some((&OVERSIZED, body)) => {
                let (len, _) = util::read_u64(body)?;
                Ok(Frame::Oversized { len: len as usize })
            }
            Some((&MISSING, _)) => Ok(Frame::Missing),
            Some((kind, _)) => Err(Error::Malformed(format!("unknown frame kind {kind}"))),
            None => Err(Error::Malformed("empty frame".into())),
        }
    }

    /// Returns the data, or the error the marker stands for.
    pub fn into_data(self, limit: usize, root: usize) -> Result<&'a [u8]> {
        match self {
            Frame::Data(body) => Ok(body),
            Frame::Oversized { len } => Err(Error::MessageTooLarge { len, limit }),
            Frame::Missing => Err(Error::MissingValue { root }),
        }
    }
}

/// Wrap an encoded value in a data frame, or in an oversized marker if it
/// exceeds `limit`.
pub fn data(encoded: Vec<u8>, limit: usize) -> std::result::Result<Vec<u8>, (Vec<u8>, Error)> {
    if encoded.len() > limit {
        let err = Error::MessageTooLarge {
            len: encoded.len(),
            limit,
        };
        return Err((oversized(encoded.len()), err));
    }
    let mut message = Vec::with_capacity(encoded.len() + 1);
    message.push(DATA);
    message.extend(encoded);
    Ok(message)
}

pub fn oversized(len: usize) -> Vec<u8> {
    let mut message = vec![OVERSIZED];
    util::write_u64(&mut message, len as u64);
    message
}

pub fn missing() -> Vec<u8> {
    vec![MISSING]
}
