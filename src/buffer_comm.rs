//! The dispatching communicator facade.
//!
//! [`BufferComm`] intercepts broadcast, gather, scatter, send and receive.
//! Each of those first runs the handshake, then moves contiguous numeric
//! arrays as typed buffers and everything else as serialized values. All
//! other methods of the wrapped communicator are reached through `Deref`.

use crate::datatype::{with_element_type, Element, ElementType};
use crate::error::{Error, Result};
use crate::message::{self, Communicator, Partition, Tag};
use crate::payload::{squeeze_leading, Array, Payload};
use crate::reconcile::ShapeTable;
use crate::rendezvous::{handshake, Op, Role};
use log::{debug, warn};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Sent ahead of a buffer so the receiver can allocate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArrayMeta {
    element: ElementType,
    shape: Vec<usize>,
}

impl ArrayMeta {
    fn of(array: &Array) -> Result<Self> {
        Ok(Self {
            element: array.element_type().ok_or_else(not_a_buffer)?,
            shape: array.shape().to_vec(),
        })
    }
}

/// What the root of a buffer scatter decided, shared with every rank before
/// any data moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ScatterPlan {
    Slices { element: ElementType, slice_shape: Vec<usize> },
    Uneven { len: usize, size: usize },
    Scalar,
}

impl ScatterPlan {
    fn for_array(array: &Array, size: usize) -> Result<Self> {
        let element = array.element_type().ok_or_else(not_a_buffer)?;
        let shape = array.shape();
        Ok(match shape.first() {
            None => ScatterPlan::Scalar,
            Some(&len) if len % size != 0 => ScatterPlan::Uneven { len, size },
            Some(&len) => {
                let mut slice_shape = shape.to_vec();
                slice_shape[0] = len / size;
                ScatterPlan::Slices { element, slice_shape }
            }
        })
    }
}

fn not_a_buffer() -> Error {
    Error::InvalidArgument("payload is not a contiguous array of the negotiated element type".into())
}

fn typed<T: Element>(array: Array) -> Result<ArrayD<T>> {
    T::from_array(array).map_err(|_| not_a_buffer())
}

fn allocate<T: Element>(shape: &[usize]) -> ArrayD<T> {
    ArrayD::from_elem(IxDyn(shape), T::default())
}

/// Runs a generic-path transfer, reporting an oversized payload in terms of
/// the operation that carried it.
fn generic<T>(op: Op, result: message::Result<T>) -> Result<T> {
    result.map_err(|err| match err {
        message::Error::MessageTooLarge { len, limit } => {
            warn!("{}: payload of {} bytes exceeds the limit of {}", op, len, limit);
            Error::PayloadTooLarge { op, size: len, limit }
        }
        other => Error::Transport(other),
    })
}

/// A communicator that picks the buffer path for contiguous numeric arrays
/// and the generic path for everything else.
///
/// Create one with [`get_or_create_facade`](crate::get_or_create_facade) to
/// share a single facade per communicator handle.
pub struct BufferComm<C> {
    comm: C,
}

impl<C> Deref for BufferComm<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.comm
    }
}

impl<C: Communicator> BufferComm<C> {
    pub fn new(comm: C) -> Self {
        debug!("wrapping rank {} of {}", comm.rank(), comm.size());
        Self { comm }
    }

    /// The wrapped communicator.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn into_inner(self) -> C {
        self.comm
    }

    /// The operations this facade dispatches itself.
    pub fn overridden_ops() -> [Op; 5] {
        [Op::Broadcast, Op::Gather, Op::Scatter, Op::Send, Op::Recv]
    }

    /// Broadcasts the root's payload to every rank. Only the root passes
    /// `Some`.
    pub fn broadcast(&self, payload: Option<Payload>, root: usize) -> Result<Payload> {
        let comm = &self.comm;
        let is_root = comm.rank() == root;
        let role = if is_root {
            Role::Root(payload.as_ref())
        } else {
            Role::Member
        };
        if !handshake(comm, Op::Broadcast, role, root, 0)? {
            let value = if is_root { payload } else { None };
            return generic(Op::Broadcast, comm.broadcast_object(value, root));
        }

        if is_root {
            let array = payload.and_then(Payload::into_array).ok_or_else(not_a_buffer)?;
            let meta = ArrayMeta::of(&array)?;
            generic(Op::Broadcast, comm.broadcast_object(Some(meta.clone()), root))?;
            with_element_type!(meta.element, T => {
                let mut data = typed::<T>(array)?;
                comm.broadcast_buffer(data.as_slice_mut().ok_or_else(not_a_buffer)?, root)?;
                Ok(Payload::Array(T::into_array(data)))
            })
        } else {
            let meta: ArrayMeta = generic(Op::Broadcast, comm.broadcast_object(None, root))?;
            with_element_type!(meta.element, T => {
                let mut data = allocate::<T>(&meta.shape);
                comm.broadcast_buffer(data.as_slice_mut().ok_or_else(not_a_buffer)?, root)?;
                Ok(Payload::Array(T::into_array(data)))
            })
        }
    }

    /// Gathers every rank's payload to `root`, in rank order. Other ranks
    /// get `None`.
    ///
    /// On the buffer path the arrays may differ in the size of one axis;
    /// if they differ in more, every rank fails with
    /// [`Error::ShapeMismatch`] before any array data moves.
    pub fn gather(&self, payload: Payload, root: usize) -> Result<Option<Vec<Payload>>> {
        let comm = &self.comm;
        if !handshake(comm, Op::Gather, Role::Contributor(&payload), root, 0)? {
            return generic(Op::Gather, comm.gather_object(payload, root));
        }

        let array = payload.into_array().ok_or_else(not_a_buffer)?;
        let meta = ArrayMeta::of(&array)?;
        // The root shares the table even when collecting it failed, so
        // ranks that did get their shape through are not left waiting.
        let gathered = comm.gather_object(meta.shape, root);
        let shared = comm.broadcast_object(gathered.as_ref().ok().cloned().flatten(), root);
        let table = ShapeTable::new(generic(Op::Gather, gathered.and(shared))?)?;
        debug!(
            "gather: rank {} contributes {:?}, varying axis {}",
            comm.rank(),
            array.shape(),
            table.varying_axis()
        );

        with_element_type!(meta.element, T => {
            let data = typed::<T>(array)?;
            let send = data.as_slice().ok_or_else(not_a_buffer)?;
            if comm.rank() != root {
                comm.gatherv_buffer(send, None, root)?;
                return Ok(None);
            }
            let mut buffer = vec![T::default(); table.total()];
            let partition = Partition {
                buffer: &mut buffer[..],
                counts: table.counts(),
                displs: table.displs(),
            };
            comm.gatherv_buffer(send, Some(partition), root)?;
            let arrays = table.split(buffer)?;
            Ok(Some(
                arrays
                    .into_iter()
                    .map(|a| Payload::Array(T::into_array(a)))
                    .collect(),
            ))
        })
    }

    /// Distributes the root's payload over the ranks. Only the root passes
    /// `Some`.
    ///
    /// An array on the buffer path is cut into equal slices along axis 0,
    /// and a leading axis of length one left by the cut is removed. On the
    /// generic path the payload must be a sequence of exactly `size` items.
    pub fn scatter(&self, payload: Option<Payload>, root: usize) -> Result<Payload> {
        let comm = &self.comm;
        let is_root = comm.rank() == root;
        let role = if is_root {
            Role::Root(payload.as_ref())
        } else {
            Role::Member
        };
        if !handshake(comm, Op::Scatter, role, root, 0)? {
            return self.scatter_generic(if is_root { payload } else { None }, root);
        }

        let source = match payload {
            Some(payload) if is_root => Some(payload.into_array().ok_or_else(not_a_buffer)?),
            _ => None,
        };
        let plan = match &source {
            Some(array) => {
                let plan = ScatterPlan::for_array(array, comm.size())?;
                generic(Op::Scatter, comm.broadcast_object(Some(plan), root))?
            }
            None => generic(Op::Scatter, comm.broadcast_object(None, root))?,
        };

        match plan {
            ScatterPlan::Uneven { len, size } => {
                warn!("scatter: leading dimension {} does not divide over {} ranks", len, size);
                Err(Error::UnevenDistribution { len, size })
            }
            ScatterPlan::Scalar => Err(Error::InvalidArgument(
                "cannot scatter a zero-dimensional array".into(),
            )),
            ScatterPlan::Slices { element, slice_shape } => with_element_type!(element, T => {
                let source = source.map(typed::<T>).transpose()?;
                let send = match &source {
                    Some(data) => Some(data.as_slice().ok_or_else(not_a_buffer)?),
                    None => None,
                };
                let mut part = allocate::<T>(&slice_shape);
                comm.scatter_buffer(send, part.as_slice_mut().ok_or_else(not_a_buffer)?, root)?;
                Ok(Payload::Array(T::into_array(squeeze_leading(part))))
            }),
        }
    }

    fn scatter_generic(&self, payload: Option<Payload>, root: usize) -> Result<Payload> {
        let comm = &self.comm;
        match payload.map(|p| p.into_items(comm.size())) {
            Some(Err(err)) => {
                // The other ranks are already waiting for their item.
                if let Err(notify) = comm.scatter_object::<Payload>(None, root) {
                    if !matches!(notify, message::Error::MissingValue { .. }) {
                        warn!("scatter: could not release the other ranks: {}", notify);
                    }
                }
                Err(err)
            }
            Some(Ok(items)) => generic(Op::Scatter, comm.scatter_object(Some(items), root)),
            None => generic(Op::Scatter, comm.scatter_object(None, root)),
        }
    }

    /// Sends `payload` to `dest`. Every message of the transfer uses `tag`.
    pub fn send(&self, payload: &Payload, dest: usize, tag: Tag) -> Result<()> {
        let comm = &self.comm;
        if !handshake(comm, Op::Send, Role::Sender(payload), dest, tag)? {
            return generic(Op::Send, comm.send_object(payload, dest, tag));
        }

        let array = payload.as_array().ok_or_else(not_a_buffer)?;
        let meta = ArrayMeta::of(array)?;
        generic(Op::Send, comm.send_object(&meta, dest, tag))?;
        with_element_type!(meta.element, T => {
            let data = T::as_array(array).ok_or_else(not_a_buffer)?;
            comm.send_buffer(data.as_slice().ok_or_else(not_a_buffer)?, dest, tag)?;
            Ok(())
        })
    }

    /// Receives a payload sent from `source` with [`send`](Self::send).
    pub fn recv(&self, source: usize, tag: Tag) -> Result<Payload> {
        let comm = &self.comm;
        if !handshake(comm, Op::Recv, Role::Receiver, source, tag)? {
            return generic(Op::Recv, comm.recv_object(source, tag));
        }

        let meta: ArrayMeta = generic(Op::Recv, comm.recv_object(source, tag))?;
        with_element_type!(meta.element, T => {
            let mut data = allocate::<T>(&meta.shape);
            comm.recv_buffer(data.as_slice_mut().ok_or_else(not_a_buffer)?, source, tag)?;
            Ok(Payload::Array(T::into_array(data)))
        })
    }
}
