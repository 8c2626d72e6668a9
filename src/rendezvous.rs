//! The handshake that runs before every dispatched operation.
//!
//! Every participant leaves the handshake with the same answer to "buffer
//! path or generic path?", and the handshake messages travel on the same
//! channel as the payload that follows, so they are always consumed first.

use crate::datatype::ElementType;
use crate::error::{Error, Result};
use crate::message::{Communicator, Tag};
use crate::payload::{buffer_element_type, is_buffer_eligible, Payload};
use log::debug;
use std::fmt;

/// The dispatched operation a handshake belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Broadcast,
    Gather,
    Scatter,
    Send,
    Recv,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Broadcast => "broadcast",
            Op::Gather => "gather",
            Op::Scatter => "scatter",
            Op::Send => "send",
            Op::Recv => "recv",
        };
        f.write_str(name)
    }
}

/// What the calling rank brings to the handshake.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Role<'a> {
    /// The root of a broadcast or scatter; the only rank that classifies.
    Root(Option<&'a Payload>),
    /// Any other rank of a broadcast or scatter.
    Member,
    /// A rank of a gather, each of which classifies its own payload.
    Contributor(&'a Payload),
    /// The sending side of a point-to-point transfer.
    Sender(&'a Payload),
    /// The receiving side of a point-to-point transfer.
    Receiver,
}

/// Agree on whether the operation takes the buffer path.
///
/// `peer` is the root for broadcast and scatter, the destination for send
/// and the source for receive; gather ignores it. `tag` is only used by the
/// point-to-point pair and must be the tag of the payload that follows.
pub(crate) fn handshake<C: Communicator>(comm: &C, op: Op, role: Role<'_>, peer: usize, tag: Tag) -> Result<bool> {
    let use_buffer = match (op, role) {
        (Op::Broadcast | Op::Scatter, Role::Root(payload)) => {
            let eligible = payload.map_or(false, is_buffer_eligible);
            comm.broadcast_object(Some(eligible), peer)?
        }
        (Op::Broadcast | Op::Scatter, Role::Member) => comm.broadcast_object::<bool>(None, peer)?,
        (Op::Gather, Role::Contributor(payload)) => {
            // Element tag when eligible, -1 otherwise. The minimum says
            // whether everyone is eligible, the negated minimum of the
            // negation (the maximum) whether everyone agrees on the type.
            let code = buffer_element_type(payload).map_or(-1, |tag| tag.code());
            let min = comm.allreduce_min(code)?;
            let max = -comm.allreduce_min(-code)?;
            let agreed = if min == max { ElementType::from_code(min) } else { None };
            if let Some(element) = agreed {
                debug!("gather: every rank contributes {} elements", element);
            }
            agreed.is_some()
        }
        (Op::Send, Role::Sender(payload)) => {
            let eligible = is_buffer_eligible(payload);
            comm.send_object(&eligible, peer, tag)?;
            eligible
        }
        (Op::Recv, Role::Receiver) => comm.recv_object::<bool>(peer, tag)?,
        (op, _) => return Err(Error::Unimplemented(op)),
    };
    debug!(
        "{}: rank {} of {} takes the {} path",
        op,
        comm.rank(),
        comm.size(),
        if use_buffer { "buffer" } else { "generic" }
    );
    Ok(use_buffer)
}
