use super::comm::{Channel, CommId, Communicator};
use super::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// The single-process fallback: a group of size one. Collectives reduce to
/// identity transforms without touching the mailbox; point-to-point
/// messages addressed to rank 0 are looped back.
#[derive(Clone)]
pub struct NullCommunicator {
    id: CommId,
    mailbox: Arc<Mutex<VecDeque<(Channel, Vec<u8>)>>>,
}

impl NullCommunicator {
    pub fn new() -> Self {
        Self {
            id: CommId::unique(),
            mailbox: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl Default for NullCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for NullCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn id(&self) -> CommId {
        self.id
    }

    fn send_bytes(&self, dest: usize, channel: Channel, message: Vec<u8>) -> Result<()> {
        self.check_rank(dest)?;
        self.mailbox.lock().push_back((channel, message));
        Ok(())
    }

    fn recv_bytes(&self, source: usize, channel: Channel) -> Result<Vec<u8>> {
        self.check_rank(source)?;
        let mut mailbox = self.mailbox.lock();
        match mailbox.iter().position(|(c, _)| c == &channel) {
            Some(index) => Ok(mailbox.remove(index).map(|(_, message)| message).unwrap_or_default()),
            // Nothing else could ever deliver the message.
            None => Err(Error::Disconnected(source)),
        }
    }
}
