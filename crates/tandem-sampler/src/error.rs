//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV decoding error.
    #[error("Hound error: {0}")]
    Hound(#[from] hound::Error),

    /// Sample format the loader does not handle.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// File decoded to zero frames or zero channels.
    #[error("Sample is empty")]
    EmptySample,

    /// Resampling failed.
    #[error("Resample error: {0}")]
    Resample(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] tandem_core::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tandem_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => tandem_core::Error::Io(e),
            Error::Hound(hound::Error::IoError(e)) => tandem_core::Error::Io(e),
            Error::Core(e) => e,
            other => tandem_core::Error::BadArguments(other.to_string()),
        }
    }
}
