use crossbeam_channel::Sender;

use super::comm::{Communicator, Tag};
use super::mailbox::{Envelope, Mailbox};
use crate::error::Error;

/// A communicator for a world of ranks that live as threads in one process.
/// Every rank owns the receiving end of its own channel and a sender to every
/// rank, itself included, so a world of one can still pass the ball.
pub struct LocalCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    mailbox: Mailbox,
}

impl LocalCommunicator {
    /// Create the communicators for a world of `size` ranks, ordered by rank.
    pub fn world(size: usize) -> Vec<Self> {
        let (sinks, srcs): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();

        srcs.into_iter()
            .enumerate()
            .map(|(rank, src)| Self {
                rank,
                peers: sinks.clone(),
                mailbox: Mailbox::new(src),
            })
            .collect()
    }

    /// Messages delivered to this rank that no receive has claimed.
    pub fn pending(&self) -> usize {
        self.mailbox.pending()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send_tagged(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        let peer = self
            .peers
            .get(rank)
            .ok_or_else(|| Error::Transport(format!("no rank {} in a world of {}", rank, self.size())))?;
        peer.send(Envelope {
            source: self.rank,
            tag,
            data: message,
        })
        .map_err(|_| Error::Disconnected(rank))
    }

    fn recv_tagged(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        self.mailbox.recv(rank, tag)
    }
}
