//! Test helpers: a communicator that logs every ball-level call it forwards,
//! and a reporter that trips the termination flag when it sees a given line.

use std::cell::RefCell;
use std::io;

use crate::error::Error;
use crate::message::{Communicator, Tag};
use crate::report::Reporter;
use crate::termination::Termination;

pub const SIGNAL: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Send(usize),
    Recv(usize),
    Broadcast(usize),
    Barrier,
}

pub struct Recording<C> {
    inner: C,
    ops: RefCell<Vec<Op>>,
}

impl<C> Recording<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            ops: RefCell::new(Vec::new()),
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn record(&self, op: Op) {
        self.ops.borrow_mut().push(op)
    }
}

impl<C: Communicator> Communicator for Recording<C> {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn send_tagged(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        self.inner.send_tagged(rank, tag, message)
    }

    fn recv_tagged(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        self.inner.recv_tagged(rank, tag)
    }

    fn send(&self, rank: usize, ball: &[u8]) -> Result<(), Error> {
        self.record(Op::Send(rank));
        self.inner.send(rank, ball)
    }

    fn recv(&self, rank: usize, ball: &mut [u8]) -> Result<(), Error> {
        self.record(Op::Recv(rank));
        self.inner.recv(rank, ball)
    }

    fn broadcast(&self, source: usize, ball: &mut [u8]) -> Result<(), Error> {
        self.record(Op::Broadcast(source));
        self.inner.broadcast(source, ball)
    }

    fn barrier(&self) -> Result<(), Error> {
        self.record(Op::Barrier);
        self.inner.barrier()
    }
}

/// Collects lines like `Vec<String>` does, and fires [SIGNAL] on the
/// termination flag right after `line` has been emitted.
pub struct TripAt<'a> {
    pub line: &'static str,
    pub termination: Termination,
    pub lines: &'a mut Vec<String>,
}

impl<'a> Reporter for TripAt<'a> {
    fn emit(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        if line == self.line {
            self.termination.fire(SIGNAL);
        }
        Ok(())
    }
}
