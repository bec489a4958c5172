use crate::parser::ParseError;
use std::io;

/// Central error type for the reactor engine.
#[derive(Debug)]
pub enum HttpdError {
    /// Underlying I/O error from the OS or network.
    Io(io::Error),
    /// Error during HTTP request parsing.
    Parse(ParseError),
    /// Connection slab reached its maximum capacity.
    SlabFull,
    /// A reactor or acceptor thread panicked or failed to spawn.
    WorkerPanic(String),
    /// Generic or miscellaneous error.
    Other(String),
}

impl std::fmt::Display for HttpdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpdError::Io(e) => write!(f, "I/O error: {}", e),
            HttpdError::Parse(e) => write!(f, "parse error: {:?}", e),
            HttpdError::SlabFull => write!(f, "connection slab is full"),
            HttpdError::WorkerPanic(msg) => write!(f, "worker panic: {}", msg),
            HttpdError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for HttpdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpdError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpdError {
    fn from(e: io::Error) -> Self {
        HttpdError::Io(e)
    }
}

impl From<ParseError> for HttpdError {
    fn from(e: ParseError) -> Self {
        HttpdError::Parse(e)
    }
}

pub type HttpdResult<T> = Result<T, HttpdError>;
