use log::info;

use super::{Bounce, Cause, Progress, Strategy};
use crate::ball::Control;
use crate::error::Error;
use crate::message::{util, Communicator};

/**
 * Point-to-point circulation around the ring of ranks. The designated root
 * injects the ball by sending first and then waits for it to come back; every
 * other rank waits for the ball before forwarding it. That ordering keeps at
 * most one message in flight on each edge of the ring.
 *
 * A rank's round counter is the number of times the ball has passed through
 * it, so the counters agree between loop iterations but not in lockstep.
 */
pub struct RingRelay {
    next: usize,
    prev: usize,
}

impl RingRelay {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            next: util::successor(rank, size),
            prev: util::predecessor(rank, size),
        }
    }

    /// Root: check, report, send, check again, receive. A signal seen after
    /// the send leaves the ball with the successor and nobody waiting for
    /// it.
    fn lead<C: Communicator + ?Sized>(
        &self,
        b: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error> {
        let rank = b.rank();
        loop {
            if let Some(signal) = b.termination.signal() {
                return Ok(Cause::Terminated(signal));
            }
            if b.config.target_reached(progress.round()) {
                return Ok(Cause::Completed);
            }
            progress.round_started()?;

            b.comm.send(self.next, b.ball.as_slice())?;
            info!("[*] Ball sent from {} to {}", rank, self.next);

            if let Some(signal) = b.termination.signal() {
                return Ok(Cause::Terminated(signal));
            }
            b.comm.recv(self.prev, b.ball.as_mut_slice())?;
            info!("[*] Ball received from {} to {}", self.prev, rank);

            progress.advance();
        }
    }

    /// Everyone else: check, receive, check again, forward. A signal seen
    /// after the receive keeps the ball here.
    fn follow<C: Communicator + ?Sized>(
        &self,
        b: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error> {
        let rank = b.rank();
        loop {
            if let Some(signal) = b.termination.signal() {
                return Ok(Cause::Terminated(signal));
            }
            if b.config.target_reached(progress.round()) {
                return Ok(Cause::Completed);
            }

            b.comm.recv(self.prev, b.ball.as_mut_slice())?;
            info!("[ ] Ball received from {} to {}", self.prev, rank);

            if let Some(signal) = b.termination.signal() {
                return Ok(Cause::Terminated(signal));
            }
            b.comm.send(self.next, b.ball.as_slice())?;
            info!("[ ] Ball sent from {} to {}", rank, self.next);

            progress.advance();
        }
    }

    /// Root, with termination carried by the ball. A local signal, or a
    /// stop request that came back on the ball, makes the root send one
    /// final `Stop` ball around the ring and wait for its return. The round
    /// target takes precedence, because the other ranks stop on their own
    /// once it is reached.
    fn lead_propagating<C: Communicator + ?Sized>(
        &self,
        b: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error> {
        let rank = b.rank();
        let mut requested = false;
        loop {
            if b.config.target_reached(progress.round()) {
                return Ok(Cause::Completed);
            }
            if requested || b.termination.is_set() {
                b.ball.set_control(Control::Stop);
                b.comm.send(self.next, b.ball.as_slice())?;
                b.comm.recv(self.prev, b.ball.as_mut_slice())?;
                info!("[*] Stop ball returned to {}", rank);
                return Ok(Cause::Terminated(b.termination.signal().unwrap_or(0)));
            }
            progress.round_started()?;

            b.ball.set_control(Control::Continue);
            b.comm.send(self.next, b.ball.as_slice())?;
            info!("[*] Ball sent from {} to {}", rank, self.next);

            b.comm.recv(self.prev, b.ball.as_mut_slice())?;
            info!("[*] Ball received from {} to {}", self.prev, rank);

            if b.ball.control() == Control::StopRequested {
                info!("stop requested by a peer at round {}", progress.round());
                requested = true;
            }
            progress.advance();
        }
    }

    /// Everyone else, with termination carried by the ball. A local signal
    /// only marks the ball on its way through; the rank stops once the
    /// root's `Stop` ball has been forwarded.
    fn follow_propagating<C: Communicator + ?Sized>(
        &self,
        b: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error> {
        let rank = b.rank();
        loop {
            if b.config.target_reached(progress.round()) {
                return Ok(Cause::Completed);
            }

            b.comm.recv(self.prev, b.ball.as_mut_slice())?;
            info!("[ ] Ball received from {} to {}", self.prev, rank);

            if b.ball.control() == Control::Stop {
                b.comm.send(self.next, b.ball.as_slice())?;
                return Ok(Cause::Terminated(b.termination.signal().unwrap_or(0)));
            }
            if b.termination.is_set() && b.ball.control() == Control::Continue {
                b.ball.set_control(Control::StopRequested);
            }
            b.comm.send(self.next, b.ball.as_slice())?;
            info!("[ ] Ball sent from {} to {}", rank, self.next);

            progress.advance();
        }
    }
}

impl Strategy for RingRelay {
    fn circulate<C: Communicator + ?Sized>(
        &mut self,
        bounce: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error> {
        match (bounce.is_root(), bounce.config.propagate_termination) {
            (true, false) => self.lead(bounce, progress),
            (false, false) => self.follow(bounce, progress),
            (true, true) => self.lead_propagating(bounce, progress),
            (false, true) => self.follow_propagating(bounce, progress),
        }
    }
}
