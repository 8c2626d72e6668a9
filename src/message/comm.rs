use super::error::{Error, Result};
use super::frame::{self, Frame};
use super::util;
use crate::coder::{CborCoder, Coder};
use crate::datatype::Element;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tag of a point-to-point message.
pub type Tag = u32;

/// The largest generic message a transport accepts unless it says otherwise:
/// the largest byte count expressible as a 32-bit MPI count.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = i32::MAX as usize;

/// Logical stream a message travels on. Messages between one pair of ranks
/// on one channel are delivered in the order they were sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Traffic generated by collective operations.
    Collective,
    /// User point-to-point traffic with the given tag.
    Point(Tag),
}

/// Stable identity of a communicator handle. Clones of a handle share it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommId(u64);

impl CommId {
    /// Allocates an identifier no other handle in this process has.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        CommId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Receive layout for a variable-count gather: rank `r` contributes
/// `counts[r]` elements, stored at `buffer[displs[r]..]`.
pub struct Partition<'a, T> {
    pub buffer: &'a mut [T],
    pub counts: &'a [usize],
    pub displs: &'a [usize],
}

impl<'a, T> Partition<'a, T> {
    fn validate(&self, size: usize) -> Result<()> {
        if self.counts.len() != size || self.displs.len() != size {
            return Err(Error::InvalidCount(format!(
                "expected {} counts and displacements, found {} and {}",
                size,
                self.counts.len(),
                self.displs.len()
            )));
        }
        for (rank, (&count, &displ)) in self.counts.iter().zip(self.displs).enumerate() {
            if displ + count > self.buffer.len() {
                return Err(Error::InvalidCount(format!(
                    "rank {} needs elements {}..{} of a buffer of {}",
                    rank,
                    displ,
                    displ + count,
                    self.buffer.len()
                )));
            }
        }
        Ok(())
    }
}

fn encode_framed<V>(value: &V, limit: usize) -> std::result::Result<Vec<u8>, (Vec<u8>, Error)>
where
    V: Serialize + DeserializeOwned,
{
    match CborCoder::<V>::new().encode(value) {
        Ok(encoded) => frame::data(encoded, limit),
        Err(err) => Err((frame::missing(), err)),
    }
}

fn decode_framed<V>(message: &[u8], limit: usize, sender: usize) -> Result<V>
where
    V: Serialize + DeserializeOwned,
{
    let body = Frame::parse(message)?.into_data(limit, sender)?;
    CborCoder::<V>::new().decode(body)
}

fn encode_elements<T: Element>(values: &[T]) -> Vec<u8> {
    let mut message = Vec::new();
    T::write_le(values, &mut message);
    message
}

/// A fixed-size, rank-addressed group of cooperating processes.
///
/// Implementors only need to write point-to-point delivery of byte messages
/// (`send_bytes` and `recv_bytes`). The trait then provides the typed-buffer
/// primitives, their generic (serialize-anything) counterparts, and a
/// minimum reduction, all as linear exchanges between the root and the
/// other ranks. Every rank of the group must call a collective primitive,
/// in the same order as every other rank.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Identity of the underlying handle.
    fn id(&self) -> CommId;

    /// Deliver a message to `dest`. Must not block waiting for the receiver.
    fn send_bytes(&self, dest: usize, channel: Channel, message: Vec<u8>) -> Result<()>;

    /// Block until the next message from `source` on `channel` arrives.
    fn recv_bytes(&self, source: usize, channel: Channel) -> Result<Vec<u8>>;

    /// Largest encoded generic message this transport will carry.
    fn max_message_bytes(&self) -> usize {
        DEFAULT_MAX_MESSAGE_BYTES
    }

    fn check_rank(&self, rank: usize) -> Result<()> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(Error::InvalidRank {
                rank,
                size: self.size(),
            })
        }
    }

    // ========================================================================
    // Typed buffers
    // ========================================================================

    /// Broadcast `buffer` from `root`; on the other ranks it must already
    /// have the root's length and is overwritten.
    fn broadcast_buffer<T: Element>(&self, buffer: &mut [T], root: usize) -> Result<()> {
        self.check_rank(root)?;
        if self.rank() == root {
            let message = encode_elements(buffer);
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.send_bytes(dest, Channel::Collective, message.clone())?;
            }
            Ok(())
        } else {
            let message = self.recv_bytes(root, Channel::Collective)?;
            T::read_le(&message, buffer)
        }
    }

    /// Gather equal-length contributions into `recv` on `root`, which must
    /// hold `send.len() * size` elements there.
    fn gather_buffer<T: Element>(&self, send: &[T], recv: Option<&mut [T]>, root: usize) -> Result<()> {
        let counts = vec![send.len(); self.size()];
        let displs: Vec<usize> = (0..self.size()).map(|r| r * send.len()).collect();
        let partition = recv.map(|buffer| Partition {
            buffer,
            counts: &counts,
            displs: &displs,
        });
        if let Some(partition) = &partition {
            if partition.buffer.len() != send.len() * self.size() {
                return Err(Error::BufferLength {
                    expected: send.len() * self.size(),
                    actual: partition.buffer.len(),
                });
            }
        }
        self.gatherv_buffer(send, partition, root)
    }

    /// Gather variable-length contributions. Only the root supplies (and
    /// must supply) the receive partition.
    fn gatherv_buffer<T: Element>(&self, send: &[T], recv: Option<Partition<'_, T>>, root: usize) -> Result<()> {
        self.check_rank(root)?;
        if self.rank() != root {
            return self.send_bytes(root, Channel::Collective, encode_elements(send));
        }
        let mut messages = Vec::with_capacity(self.size());
        for source in 0..self.size() {
            if source == root {
                messages.push(None);
            } else {
                messages.push(Some(self.recv_bytes(source, Channel::Collective)?));
            }
        }
        let partition = recv.ok_or_else(|| {
            Error::InvalidCount("the root of a gather needs a receive partition".into())
        })?;
        partition.validate(self.size())?;

        for (source, message) in messages.into_iter().enumerate() {
            let start = partition.displs[source];
            let slot = &mut partition.buffer[start..start + partition.counts[source]];
            match message {
                Some(message) => T::read_le(&message, slot)?,
                None if send.len() == slot.len() => slot.copy_from_slice(send),
                None => {
                    return Err(Error::BufferLength {
                        expected: slot.len(),
                        actual: send.len(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Scatter equal chunks of the root's `send` buffer; every rank receives
    /// `recv.len()` elements.
    fn scatter_buffer<T: Element>(&self, send: Option<&[T]>, recv: &mut [T], root: usize) -> Result<()> {
        self.check_rank(root)?;
        if self.rank() != root {
            let message = self.recv_bytes(root, Channel::Collective)?;
            return T::read_le(&message, recv);
        }
        let send = send.unwrap_or(&[]);
        let chunk = recv.len();
        if send.len() != chunk * self.size() {
            return Err(Error::BufferLength {
                expected: chunk * self.size(),
                actual: send.len(),
            });
        }
        for dest in 0..self.size() {
            let part = &send[dest * chunk..(dest + 1) * chunk];
            if dest == root {
                recv.copy_from_slice(part);
            } else {
                self.send_bytes(dest, Channel::Collective, encode_elements(part))?;
            }
        }
        Ok(())
    }

    fn send_buffer<T: Element>(&self, buffer: &[T], dest: usize, tag: Tag) -> Result<()> {
        self.check_rank(dest)?;
        self.send_bytes(dest, Channel::Point(tag), encode_elements(buffer))
    }

    /// Receive into `buffer`, whose length must match the sent buffer.
    fn recv_buffer<T: Element>(&self, buffer: &mut [T], source: usize, tag: Tag) -> Result<()> {
        self.check_rank(source)?;
        let message = self.recv_bytes(source, Channel::Point(tag))?;
        T::read_le(&message, buffer)
    }

    // ========================================================================
    // Generic objects
    // ========================================================================

    /// Broadcast a serializable value from `root`, which must pass `Some`.
    /// On a group of one the value is returned untouched.
    fn broadcast_object<V>(&self, value: Option<V>, root: usize) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
    {
        self.check_rank(root)?;
        let limit = self.max_message_bytes();
        if self.rank() != root {
            let message = self.recv_bytes(root, Channel::Collective)?;
            return decode_framed(&message, limit, root);
        }
        if self.size() == 1 {
            return value.ok_or(Error::MissingValue { root });
        }
        let (message, outcome) = match value {
            Some(value) => match encode_framed(&value, limit) {
                Ok(message) => (message, Ok(value)),
                Err((marker, err)) => (marker, Err(err)),
            },
            None => (frame::missing(), Err(Error::MissingValue { root })),
        };
        for dest in (0..self.size()).filter(|&r| r != root) {
            self.send_bytes(dest, Channel::Collective, message.clone())?;
        }
        outcome
    }

    /// Gather one serializable value per rank to `root`, in rank order.
    /// Other ranks get `None`.
    fn gather_object<V>(&self, value: V, root: usize) -> Result<Option<Vec<V>>>
    where
        V: Serialize + DeserializeOwned,
    {
        self.check_rank(root)?;
        let limit = self.max_message_bytes();
        if self.rank() != root {
            let (message, outcome) = match encode_framed(&value, limit) {
                Ok(message) => (message, Ok(None)),
                Err((marker, err)) => (marker, Err(err)),
            };
            self.send_bytes(root, Channel::Collective, message)?;
            return outcome;
        }
        let mut own = Some(value);
        let mut items = Vec::with_capacity(self.size());
        let mut failure = None;
        for source in 0..self.size() {
            if source == root {
                items.extend(own.take());
                continue;
            }
            let message = self.recv_bytes(source, Channel::Collective)?;
            match decode_framed(&message, limit, source) {
                Ok(item) => items.push(item),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(Some(items)),
        }
    }

    /// Scatter `values[i]` to rank `i`. Only the root passes `Some`, with
    /// exactly `size` values.
    fn scatter_object<V>(&self, values: Option<Vec<V>>, root: usize) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
    {
        self.check_rank(root)?;
        let limit = self.max_message_bytes();
        if self.rank() != root {
            let message = self.recv_bytes(root, Channel::Collective)?;
            return decode_framed(&message, limit, root);
        }
        let others = (0..self.size()).filter(|&r| r != root);
        let values = match values {
            Some(values) if values.len() == self.size() => values,
            rejected => {
                for dest in others {
                    self.send_bytes(dest, Channel::Collective, frame::missing())?;
                }
                return Err(match rejected {
                    Some(values) => Error::InvalidCount(format!(
                        "cannot scatter {} values over {} ranks",
                        values.len(),
                        self.size()
                    )),
                    None => Error::MissingValue { root },
                });
            }
        };

        let mut own = None;
        let mut messages = Vec::with_capacity(self.size());
        let mut failure = None;
        for (dest, value) in values.into_iter().enumerate() {
            if dest == root {
                own = Some(value);
                continue;
            }
            match encode_framed(&value, limit) {
                Ok(message) => messages.push((dest, message)),
                Err((marker, err)) => {
                    failure.get_or_insert((marker, err));
                }
            }
        }
        if let Some((marker, err)) = failure {
            for dest in others {
                self.send_bytes(dest, Channel::Collective, marker.clone())?;
            }
            return Err(err);
        }
        for (dest, message) in messages {
            self.send_bytes(dest, Channel::Collective, message)?;
        }
        own.ok_or(Error::MissingValue { root })
    }

    fn send_object<V>(&self, value: &V, dest: usize, tag: Tag) -> Result<()>
    where
        V: Serialize + DeserializeOwned,
    {
        self.check_rank(dest)?;
        match encode_framed(value, self.max_message_bytes()) {
            Ok(message) => self.send_bytes(dest, Channel::Point(tag), message),
            Err((marker, err)) => {
                self.send_bytes(dest, Channel::Point(tag), marker)?;
                Err(err)
            }
        }
    }

    fn recv_object<V>(&self, source: usize, tag: Tag) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
    {
        self.check_rank(source)?;
        let message = self.recv_bytes(source, Channel::Point(tag))?;
        decode_framed(&message, self.max_message_bytes(), source)
    }

    // ========================================================================
    // Reduction and synchronization
    // ========================================================================

    /// Minimum of `value` over all ranks, known to every rank.
    fn allreduce_min(&self, value: i64) -> Result<i64> {
        if self.size() == 1 {
            return Ok(value);
        }
        let mut message = Vec::with_capacity(8);
        if self.rank() != 0 {
            util::write_u64(&mut message, value as u64);
            self.send_bytes(0, Channel::Collective, message)?;
            let reply = self.recv_bytes(0, Channel::Collective)?;
            return util::read_i64_exact(&reply);
        }
        let mut min = value;
        for source in 1..self.size() {
            let bytes = self.recv_bytes(source, Channel::Collective)?;
            min = min.min(util::read_i64_exact(&bytes)?);
        }
        util::write_u64(&mut message, min as u64);
        for dest in 1..self.size() {
            self.send_bytes(dest, Channel::Collective, message.clone())?;
        }
        Ok(min)
    }

    /// No rank returns before every rank has entered the barrier.
    fn barrier(&self) -> Result<()> {
        self.allreduce_min(0).map(|_| ())
    }
}
