//! Error types for tandem-core.
//!
//! Two layers: [`Status`] is the cheap, `Copy` outcome returned by per-port
//! operations that must never raise (they run next to the audio thread), and
//! [`Error`] is the regular error type for setup-time operations.

use thiserror::Error;

/// Outcome of a non-propagating port, queue or KVT operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation completed.
    Ok,
    /// Nothing to do. Not an error.
    NoData,
    /// Buffer or queue too small. Recoverable by growth or skip.
    Overflow,
    /// Allocation failed. Recoverable by skipping the operation.
    NoMem,
    /// Contract violation: wrong state for this call.
    BadState,
    /// Contract violation: bad input.
    BadArguments,
}

impl Status {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// `NoData` is not an error, only the last three variants are.
    #[inline]
    pub fn is_error(self) -> bool {
        !matches!(self, Status::Ok | Status::NoData)
    }
}

/// Error type for tandem-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("Bad state: {0}")]
    BadState(String),

    #[error("Buffer overflow")]
    Overflow,

    #[error("Out of memory")]
    NoMem,

    #[error("Duplicate port id: {0}")]
    DuplicatePort(String),

    #[error("Unknown port id: {0}")]
    UnknownPort(String),

    #[error("Duplicate plugin uid: {0}")]
    DuplicatePlugin(String),

    #[error("Executor is shut down")]
    ExecutorShutdown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Collapse into the per-port status taxonomy.
    pub fn status(&self) -> Status {
        match self {
            Error::Overflow => Status::Overflow,
            Error::NoMem => Status::NoMem,
            Error::BadState(_) | Error::ExecutorShutdown => Status::BadState,
            Error::InvalidConfig(_)
            | Error::BadArguments(_)
            | Error::DuplicatePort(_)
            | Error::UnknownPort(_)
            | Error::DuplicatePlugin(_) => Status::BadArguments,
            Error::Io(_) => Status::BadState,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(Status::Ok.is_ok());
        assert!(!Status::NoData.is_error());
        assert!(Status::Overflow.is_error());
        assert!(Status::NoMem.is_error());
        assert!(Status::BadState.is_error());
    }

    #[test]
    fn test_error_to_status() {
        assert_eq!(Error::Overflow.status(), Status::Overflow);
        assert_eq!(Error::NoMem.status(), Status::NoMem);
        assert_eq!(
            Error::UnknownPort("gain".into()).status(),
            Status::BadArguments
        );
        assert_eq!(Error::ExecutorShutdown.status(), Status::BadState);
    }
}
