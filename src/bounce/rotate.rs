use log::info;

use super::{Bounce, Cause, Progress, Strategy};
use crate::ball::Control;
use crate::error::Error;
use crate::message::{util, Communicator};

/**
 * Collective circulation: each step, every rank joins one broadcast whose
 * source is the current root, and then the current root moves on to the next
 * rank. Over a rotation every rank is the source exactly once, starting from
 * the designated root. The rotation is deterministic, so all ranks agree on
 * the source of every step and count a round each time the source comes back
 * to the designated root.
 *
 * Every rank polls its own termination flag before each step. A rank that
 * stops on its own leaves the others waiting inside the next broadcast;
 * `Config::propagate_termination` avoids that by having the source announce
 * the stop in the ball.
 */
pub struct RotatingBroadcast {
    root: usize,
    current: usize,
}

impl RotatingBroadcast {
    pub fn new(root: usize) -> Self {
        Self {
            root,
            current: root,
        }
    }

    /// The rank that will be the broadcast source for the next step.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move the source to the next rank, counting a round when the rotation
    /// is back at the designated root.
    fn rotate(&mut self, size: usize, progress: &mut Progress<'_>) {
        self.current = util::successor(self.current, size);
        if self.current == self.root {
            progress.advance();
        }
    }

    fn step<C: Communicator + ?Sized>(&self, b: &mut Bounce<'_, C>) -> Result<(), Error> {
        let rank = b.rank();
        if rank == self.current {
            info!("[*] Ball sent from {}", rank);
        }
        b.comm.broadcast(self.current, b.ball.as_mut_slice())?;
        if rank != self.current {
            info!("[ ] Ball received in {}", rank);
        }
        Ok(())
    }

    fn starts_round(&self, rank: usize) -> bool {
        self.current == self.root && rank == self.root
    }
}

impl Strategy for RotatingBroadcast {
    fn circulate<C: Communicator + ?Sized>(
        &mut self,
        b: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error> {
        let (rank, size) = (b.rank(), b.size());

        if !b.config.propagate_termination {
            loop {
                if let Some(signal) = b.termination.signal() {
                    return Ok(Cause::Terminated(signal));
                }
                if b.config.target_reached(progress.round()) {
                    return Ok(Cause::Completed);
                }
                if self.starts_round(rank) {
                    progress.round_started()?;
                }
                self.step(b)?;
                self.rotate(size, progress);
            }
        }

        // The source decides for everyone: it reads its own flag and writes
        // the verdict into the ball before broadcasting it.
        loop {
            if b.config.target_reached(progress.round()) {
                return Ok(Cause::Completed);
            }
            if rank == self.current {
                let control = if b.termination.is_set() {
                    Control::Stop
                } else {
                    Control::Continue
                };
                b.ball.set_control(control);
            }
            if self.starts_round(rank) && b.ball.control() != Control::Stop {
                progress.round_started()?;
            }
            self.step(b)?;
            if b.ball.control() == Control::Stop {
                return Ok(Cause::Terminated(b.termination.signal().unwrap_or(0)));
            }
            self.rotate(size, progress);
        }
    }
}
