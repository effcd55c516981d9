//! Centralized error type for the voxmorph umbrella crate.
//!
//! Wraps subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] voxmorph_core::Error),

    #[error("Worker: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the run this error came from cannot continue.
    pub fn is_stream_fatal(&self) -> bool {
        match self {
            Error::Core(err) => err.is_stream_fatal(),
            Error::Worker(_) | Error::Io(_) => true,
        }
    }

    /// The underlying core error, if any.
    pub fn as_core(&self) -> Option<&voxmorph_core::Error> {
        match self {
            Error::Core(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
