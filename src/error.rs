//! Error types for the dispatching layer.

use crate::message;
use crate::rendezvous::Op;
use thiserror::Error;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The argument is not something this operation can work with, such as
    /// an invalid communicator handle or a value that cannot be scattered.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Arrays gathered on the buffer path differ in more than one axis, or
    /// in their number of dimensions.
    #[error("input arrays differ in size in more than one axis: {shapes:?}")]
    ShapeMismatch { shapes: Vec<Vec<usize>> },

    /// The leading dimension of a scattered array is not a multiple of the
    /// group size.
    #[error("leading dimension of {len} cannot be divided evenly over {size} ranks")]
    UnevenDistribution { len: usize, size: usize },

    /// A payload on the generic path is larger than the transport accepts.
    #[error("payload given to {op} has a byte size of {size}, larger than the limit of {limit}")]
    PayloadTooLarge { op: Op, size: usize, limit: usize },

    /// A handshake helper was invoked for a role that does not belong to the
    /// operation. This is a bug in the caller.
    #[error("no handshake is defined for {0} in this role")]
    Unimplemented(Op),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] message::Error),
}
