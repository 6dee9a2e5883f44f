//! The bounce engine: the strategies that pass the ball between ranks, the
//! round accounting, and the per-rank run sequence that wraps them in
//! allocation, start and end barriers, and teardown.
//!
//! Each strategy polls the termination flag only at points where no message
//! is half exchanged, so a signal stops the loop without posting new
//! communication. The flag is local to the process that received the signal.
//! With the default settings other ranks are not told, which can leave them
//! blocked in the ring or in a broadcast; `Config::propagate_termination`
//! carries the request through the ball instead.

mod progress;
mod ring;
mod rotate;

#[cfg(test)]
mod recording;

use log::{debug, error, info};

pub use progress::Progress;
pub use ring::RingRelay;
pub use rotate::RotatingBroadcast;

use crate::ball::Ball;
use crate::config::{Config, Method};
use crate::error::Error;
use crate::message::Communicator;
use crate::report::Reporter;
use crate::termination::Termination;

/// Why a rank's circulation loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// The round target was reached.
    Completed,
    /// The round target was zero; the ball never moved.
    Skipped,
    /// The loop stopped early. Carries the signal number observed by this
    /// rank, or zero if the stop was requested by a peer through the ball.
    Terminated(usize),
}

/// The result of one rank's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub rank: usize,
    pub rounds: u64,
    pub cause: Cause,
}

/// Everything a strategy needs to move the ball on one rank.
pub struct Bounce<'a, C: ?Sized> {
    pub comm: &'a C,
    pub config: &'a Config,
    pub termination: &'a Termination,
    pub ball: &'a mut Ball,
}

impl<'a, C: Communicator + ?Sized> Bounce<'a, C> {
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn is_root(&self) -> bool {
        self.rank() == self.config.root
    }
}

/// A way of circulating the ball. Implementations loop until the round
/// target is reached or the termination flag is observed at a safe point,
/// advancing `progress` at their round boundaries.
pub trait Strategy {
    fn circulate<C: Communicator + ?Sized>(
        &mut self,
        bounce: &mut Bounce<'_, C>,
        progress: &mut Progress<'_>,
    ) -> Result<Cause, Error>;
}

/// Run the configured strategy on this rank and report how it ended. No
/// barriers are involved; see [run_rank] for the full sequence.
pub fn circulate<C: Communicator + ?Sized>(
    bounce: &mut Bounce<'_, C>,
    progress: &mut Progress<'_>,
) -> Result<Outcome, Error> {
    let cause = match bounce.config.method {
        Method::RingRelay => RingRelay::new(bounce.rank(), bounce.size()).circulate(bounce, progress)?,
        Method::RotatingBroadcast => {
            RotatingBroadcast::new(bounce.config.root).circulate(bounce, progress)?
        }
    };

    if let Cause::Terminated(signal) = cause {
        progress.terminated(signal, bounce.rank(), bounce.size())?;
    }
    Ok(Outcome {
        rank: bounce.rank(),
        rounds: progress.round(),
        cause,
    })
}

/// Run one rank from allocation to teardown: allocate the ball, meet the
/// other ranks at the start barrier, circulate unless the round target is
/// zero, release the ball, close the progress sink, and meet again at the
/// end barrier. The reporter is only used if this rank is the designated
/// root.
pub fn run_rank<C: Communicator + ?Sized>(
    comm: &C,
    config: &Config,
    termination: &Termination,
    reporter: Option<&mut dyn Reporter>,
) -> Result<Outcome, Error> {
    let (rank, size) = (comm.rank(), comm.size());
    info!("initialization complete for rank {} of {}", rank, size);

    let mut progress = Progress::new(reporter.filter(|_| rank == config.root));

    debug!("allocating the ball in rank {} of {}", rank, size);
    let mut ball = match Ball::allocate(config.ball_size) {
        Ok(ball) => ball,
        Err(e) => {
            error!("{} in rank {} of {}", e, rank, size);
            progress.finish()?;
            return Err(e);
        }
    };
    info!("ball allocated in rank {} of {}", rank, size);

    comm.barrier()?;
    info!("barrier reached for rank {} of {}", rank, size);

    let outcome = if config.skips_circulation() {
        Outcome {
            rank,
            rounds: 0,
            cause: Cause::Skipped,
        }
    } else {
        let mut bounce = Bounce {
            comm,
            config,
            termination,
            ball: &mut ball,
        };
        let outcome = circulate(&mut bounce, &mut progress)?;
        info!("ball-passing loop has exited in rank {} of {}", rank, size);
        outcome
    };

    drop(ball);
    info!("ball deallocated in rank {} of {}", rank, size);

    progress.finish()?;

    comm.barrier()?;
    info!("barrier reached for rank {} of {}", rank, size);

    Ok(outcome)
}
