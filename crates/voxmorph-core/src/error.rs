//! Error types for voxmorph-core.

use thiserror::Error;

/// Error type for core operations.
///
/// Configuration, ordering and sample-rate errors are stream-fatal.
/// `DecompositionFailure` is recovered per frame by the analyzer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Out of order chunk: expected sequence {expected}, got {got}")]
    OutOfOrderChunk { expected: u64, got: u64 },

    #[error("Out of order frame: expected index {expected}, got {got}")]
    OutOfOrderFrame { expected: u64, got: u64 },

    #[error("Sample rate mismatch: stream is {expected} Hz, chunk is {got} Hz")]
    SampleRateMismatch { expected: u32, got: u32 },

    #[error("Decomposition failure: {0}")]
    DecompositionFailure(String),

    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    #[error("Stream already closed")]
    StreamClosed,
}

impl Error {
    /// Whether this error ends the run it occurred in.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_)
                | Error::OutOfOrderChunk { .. }
                | Error::OutOfOrderFrame { .. }
                | Error::SampleRateMismatch { .. }
                | Error::StreamClosed
        )
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
