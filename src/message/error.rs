//! Error types for the transport layer.

use std::time::Duration;
use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a [`Communicator`](super::Communicator) or by the
/// collective primitives it provides.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A rank argument is outside `0..size`.
    #[error("invalid rank {rank} for a communicator of size {size}")]
    InvalidRank { rank: usize, size: usize },

    /// A typed buffer does not have the length the message requires.
    #[error("buffer holds {actual} elements but {expected} were expected")]
    BufferLength { expected: usize, actual: usize },

    /// Counts or displacements handed to a variable-count primitive are
    /// inconsistent with the group or the receive buffer.
    #[error("invalid count: {0}")]
    InvalidCount(String),

    /// An encoded generic message exceeds the transport size limit.
    #[error("message of {len} bytes exceeds the transport limit of {limit} bytes")]
    MessageTooLarge { len: usize, limit: usize },

    /// The root of a generic collective had no value to distribute.
    #[error("root rank {root} did not provide a value")]
    MissingValue { root: usize },

    /// A value could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// A value could not be deserialized.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A message arrived with a header this transport does not understand.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The peer channels are gone.
    #[error("peer {0} is disconnected")]
    Disconnected(usize),

    /// No message arrived from the given source within the receive timeout.
    #[error("timed out after {after:?} waiting for a message from rank {peer}")]
    Timeout { peer: usize, after: Duration },
}
