use serde::{Deserialize, Serialize};

use super::util;
use crate::error::Error;

/// Traffic class of a message. Receives only match messages of the same
/// class, so collective traffic can never be mistaken for the ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Ball,
    Broadcast,
    Barrier,
}

/// Interface for a fixed group of processes that can exchange messages over
/// a network. The underlying transport can in principle be TCP, in-process
/// channels, or a higher level abstraction like MPI.
///
/// Implementors only need to provide tagged `send` and selective `recv`; the
/// ball-level operations and the collectives (broadcast from any source,
/// barrier) have default implementations on top of those.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return once the transport has accepted the message; it is not allowed
    /// to block until a matching receive is posted.
    fn send_tagged(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error>;

    /// Must be implemented to receive the next message with the given tag
    /// from a specific peer. Messages from one peer with one tag are
    /// delivered in the order they were sent. This method is allowed to
    /// block until such a message arrives.
    fn recv_tagged(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error>;

    /// Send the contents of the ball to a peer.
    fn send(&self, rank: usize, ball: &[u8]) -> Result<(), Error> {
        self.send_tagged(rank, Tag::Ball, ball.to_vec())
    }

    /// Receive a ball from a peer into `ball`, which must have the same size
    /// as the one that was sent.
    fn recv(&self, rank: usize, ball: &mut [u8]) -> Result<(), Error> {
        let message = self.recv_tagged(rank, Tag::Ball)?;
        copy_into(ball, &message)
    }

    /// Implements a binomial tree broadcast of `ball` from the `source` rank.
    /// Every rank must call this with the same source; on return every
    /// rank's buffer holds the source's bytes.
    ///
    fn broadcast(&self, source: usize, ball: &mut [u8]) -> Result<(), Error> {
        let value = if self.rank() == source {
            tree_broadcast(self, source, Tag::Broadcast, Some(ball.to_vec()))?
        } else {
            tree_broadcast(self, source, Tag::Broadcast, None)?
        };
        copy_into(ball, &value)
    }

    /// Block until every rank has entered the barrier. Implemented as a
    /// binomial tree gather to rank zero, followed by a broadcast of an empty
    /// release token.
    ///
    fn barrier(&self) -> Result<(), Error> {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    self.recv_tagged(r + one, Tag::Barrier)?;
                }
            } else {
                self.send_tagged(r - one, Tag::Barrier, Vec::new())?;
                break;
            }
        }
        let token = if r == 0 { Some(Vec::new()) } else { None };
        tree_broadcast(self, 0, Tag::Barrier, token)?;
        Ok(())
    }
}

/// Binomial tree broadcast over ranks numbered relative to `source`. The
/// message must be `Some` on the source rank and `None` everywhere else. A
/// non-source rank receives from its parent, the relative rank with the
/// lowest set bit cleared, and then forwards to its own subtree.
///
fn tree_broadcast<C: Communicator + ?Sized>(
    comm: &C,
    source: usize,
    tag: Tag,
    value: Option<Vec<u8>>,
) -> Result<Vec<u8>, Error> {
    let p = comm.size();
    let r = util::relative_rank(comm.rank(), source, p);

    let value = match value {
        Some(value) => value,
        None => {
            let parent = r & (r - 1);
            comm.recv_tagged(util::absolute_rank(parent, source, p), tag)?
        }
    };
    for level in (0..util::ceil_log2(p)).rev() {
        let one = 1 << level;
        let two = 1 << (level + 1);

        if r % two == 0 && r + one < p {
            comm.send_tagged(util::absolute_rank(r + one, source, p), tag, value.clone())?
        }
    }
    Ok(value)
}

fn copy_into(ball: &mut [u8], message: &[u8]) -> Result<(), Error> {
    if message.len() != ball.len() {
        return Err(Error::SizeMismatch {
            expected: ball.len(),
            got: message.len(),
        });
    }
    ball.copy_from_slice(message);
    Ok(())
}
