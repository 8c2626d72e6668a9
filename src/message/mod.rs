//! A minimal message-passing transport.
//!
//! This module exports the transport capability the dispatching layer
//! builds on, encapsulated by the [`Communicator`] trait. Implementors only
//! need to write `send_bytes` and `recv_bytes` for a given transport layer
//! (an in-process, thread-based example is included in
//! [`LocalCommunicator`]). The trait then provides default implementations
//! of the typed-buffer and generic collectives, point-to-point transfers and
//! a minimum reduction.

mod comm;
mod error;
mod frame;
mod local;
mod null;
mod util;

pub use comm::{Channel, CommId, Communicator, Partition, Tag, DEFAULT_MAX_MESSAGE_BYTES};
pub use error::{Error, Result};
pub use local::LocalCommunicator;
pub use null::NullCommunicator;
