//! Centralized error type for the tandem umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tandem_core::Error),

    #[cfg(feature = "sampler")]
    #[error("Sampler: {0}")]
    Sampler(#[from] tandem_sampler::Error),

    #[error("Unknown plugin uid: {0}")]
    UnknownPlugin(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
