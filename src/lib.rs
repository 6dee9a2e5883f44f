//! Bounce is a harness for exercising the message transport between a fixed
//! group of cooperating processes ("ranks"). A fixed-size buffer, the ball,
//! is passed among the ranks for a configurable number of rounds, either
//! around a ring with point-to-point sends and receives, or by a broadcast
//! whose source rotates through every rank. A run can be stopped early and
//! cleanly by a signal delivered to one process; the designated root rank
//! reports every round boundary and the reason the run ended.
//!
//! The transport sits behind the [message::Communicator] trait. Two
//! implementations are included: in-process channels for a world of threads,
//! and TCP for a world of processes.

pub mod ball;
pub mod bounce;
pub mod config;
pub mod error;
pub mod launch;
pub mod message;
pub mod report;
pub mod termination;

pub use bounce::{run_rank, Cause, Outcome};
pub use config::{Config, Method};
pub use error::Error;
pub use termination::Termination;
