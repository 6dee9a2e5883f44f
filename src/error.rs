use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]

/**
 * Error to represent a failed run: bad configuration, a ball that could not
 * be allocated, or a transport operation that did not complete. None of these
 * are retried by the bounce engine.
 */
pub enum Error {
    Config(String),
    Allocation(usize),
    Transport(String),
    Disconnected(usize),
    SizeMismatch { expected: usize, got: usize },
    Io(io::Error),
}

impl Error {
    /// Process exit status for this error: configuration problems map to
    /// `EINVAL`, everything else is a generic failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 22,
            _ => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            Config(msg) => write!(fmt, "invalid configuration: {}", msg),
            Allocation(size) => write!(fmt, "failed to allocate ball of {} bytes", size),
            Transport(msg) => write!(fmt, "transport failure: {}", msg),
            Disconnected(rank) => write!(fmt, "peer rank {} is disconnected", rank),
            SizeMismatch { expected, got } => write!(
                fmt,
                "received {} bytes where the ball is {} bytes",
                got, expected
            ),
            Io(e) => write!(fmt, "i/o error: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
