//! Collective and point-to-point communication that moves contiguous numeric
//! arrays as typed buffers and everything else as serialized values.
//!
//! Wrap any [`Communicator`] with [`get_or_create_facade`] to obtain a
//! [`BufferComm`]. Its `broadcast`, `gather`, `scatter`, `send` and `recv`
//! first agree with the other ranks on which path to take; every other
//! method is the wrapped communicator's own.
//!
//! ```no_run
//! use buffercomm::{get_or_create_facade, Communicator, LocalCommunicator, Payload};
//! use ndarray::ArrayD;
//!
//! let handles: Vec<_> = LocalCommunicator::cluster(2)
//!     .into_iter()
//!     .map(|comm| {
//!         std::thread::spawn(move || {
//!             let comm = get_or_create_facade(comm)?;
//!             let data = (comm.rank() == 0).then(|| Payload::from(ArrayD::<f64>::zeros(vec![4, 4])));
//!             comm.broadcast(data, 0)
//!         })
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap().unwrap();
//! }
//! ```

pub mod buffer_comm;
pub mod coder;
pub mod config;
pub mod datatype;
pub mod error;
pub mod message;
pub mod payload;
pub mod reconcile;
pub mod registry;
pub mod rendezvous;
pub mod utils;

pub use buffer_comm::BufferComm;
pub use config::Config;
pub use datatype::{Element, ElementType};
pub use error::{Error, Result};
pub use message::{
    Channel, CommId, Communicator, LocalCommunicator, NullCommunicator, Tag, DEFAULT_MAX_MESSAGE_BYTES,
};
pub use payload::{buffer_element_type, is_buffer_eligible, Array, Payload};
pub use registry::{get_or_create_facade, Wrap};
pub use rendezvous::Op;
pub use utils::{rank_prefix, rprint, with_rank_prefix};
