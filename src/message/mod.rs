//! This module exports a minimal message-passing API, which is encapsulated
//! by a `Communicator` trait. Implementors only need to write tagged `send`
//! and selective `recv` operations for a given transport layer; the trait
//! then provides default implementations for passing the ball, broadcasting
//! it from any rank, and barrier synchronization. Two transports are
//! included: in-process channels for a world of threads, and a pure-Rust TCP
//! transport for a world of processes.
//!

mod backoff;
pub mod comm;
pub mod local;
pub mod mailbox;
pub mod tcp;
pub mod util;

pub use comm::{Communicator, Tag};
pub use local::LocalCommunicator;
pub use tcp::{TcpCommunicator, TcpHost};
