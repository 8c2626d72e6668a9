//! Provides a message-passing communicator between threads of one process.
//!
//! Each rank owns the receiving end of an unbounded channel and a handle to
//! the sending end of every rank's channel, so sends never block. A receive
//! names the rank and channel it expects; anything else that arrives first
//! is parked and handed out to a later receive.

use super::comm::{Channel, CommId, Communicator};
use super::error::{Error, Result};
use crate::config::Config;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

struct Envelope {
    source: usize,
    channel: Channel,
    message: Vec<u8>,
}

/// One rank of an in-process group. Create the whole group at once with
/// [`LocalCommunicator::cluster`] and move each handle onto its own thread.
///
/// Every handle holds a sender to every rank, so [`Error::Disconnected`] is
/// only reported once all handles of the peer are gone. A handle wrapped
/// with [`get_or_create_facade`](crate::get_or_create_facade) lives as long
/// as the process, after which its peers never see it disconnect; set a
/// receive timeout in the [`Config`] to bound a receive from a departed rank.
#[derive(Clone)]
pub struct LocalCommunicator {
    id: CommId,
    rank: usize,
    peers: Arc<Vec<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    undelivered: Arc<Mutex<Vec<Envelope>>>,
    config: Config,
}

impl LocalCommunicator {
    /// Creates the handles of an in-process group of `size` ranks, in rank
    /// order.
    pub fn cluster(size: usize) -> Vec<Self> {
        Self::cluster_with_config(size, Config::default())
    }

    pub fn cluster_with_config(size: usize, config: Config) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();
        let peers = Arc::new(senders);
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Self {
                id: CommId::unique(),
                rank,
                peers: peers.clone(),
                inbox,
                undelivered: Arc::new(Mutex::new(Vec::new())),
                config: config.clone(),
            })
            .collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn next_envelope(&self, source: usize, deadline: Option<Instant>) -> Result<Envelope> {
        match (deadline, self.config.recv_timeout) {
            (Some(deadline), Some(after)) => self.inbox.recv_deadline(deadline).map_err(|e| match e {
                RecvTimeoutError::Timeout => Error::Timeout { peer: source, after },
                RecvTimeoutError::Disconnected => Error::Disconnected(source),
            }),
            _ => self.inbox.recv().map_err(|_| Error::Disconnected(source)),
        }
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn id(&self) -> CommId {
        self.id
    }

    fn max_message_bytes(&self) -> usize {
        self.config.max_message_bytes
    }

    fn send_bytes(&self, dest: usize, channel: Channel, message: Vec<u8>) -> Result<()> {
        self.check_rank(dest)?;
        trace!("rank {} -> {} on {:?}: {} bytes", self.rank, dest, channel, message.len());
        self.peers[dest]
            .send(Envelope {
                source: self.rank,
                channel,
                message,
            })
            .map_err(|_| Error::Disconnected(dest))
    }

    fn recv_bytes(&self, source: usize, channel: Channel) -> Result<Vec<u8>> {
        self.check_rank(source)?;
        let mut undelivered = self.undelivered.lock();
        if let Some(index) = undelivered
            .iter()
            .position(|e| e.source == source && e.channel == channel)
        {
            return Ok(undelivered.remove(index).message);
        }
        let deadline = self.config.recv_timeout.map(|after| Instant::now() + after);
        loop {
            let envelope = self.next_envelope(source, deadline)?;
            if envelope.source == source && envelope.channel == channel {
                trace!(
                    "rank {} <- {} on {:?}: {} bytes",
                    self.rank,
                    source,
                    channel,
                    envelope.message.len()
                );
                return Ok(envelope.message);
            }
            undelivered.push(envelope);
        }
    }
}
