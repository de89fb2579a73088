//! Error taxonomy shared by the splice engine and codec back-ends.
//!
//! Errors are tagged by kind rather than arranged in a hierarchy: parameter
//! errors ([`Error::UnknownCodec`], [`Error::InvalidBuffer`]), resource
//! errors ([`Error::Memory`], [`Error::Io`]), codec-internal failures
//! ([`Error::Codec`]) and loading failures ([`Error::UnableToLoad`]).
//! Control-flow signals such as "more output pending" or "buffer full" are
//! **not** errors; they are modeled as enum values
//! ([`crate::codec::StreamStatus`], [`crate::codec::BufferResult`]) and are
//! resolved inside the engine before a splice call returns.

use std::io;

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by splice operations and codec back-ends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested codec name is not present in the registry.
    #[error("unknown codec: {0:?}")]
    UnknownCodec(String),

    /// A codec with the same name is already registered.
    #[error("codec {0:?} is already registered")]
    DuplicateCodec(String),

    /// An allocation of the given size could not be satisfied.
    #[error("failed to allocate {0} bytes")]
    Memory(usize),

    /// The source or sink reported a hard I/O failure.
    ///
    /// Errors returned by caller-supplied readers and writers are propagated
    /// verbatim through this variant after per-call resources have been
    /// released.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The codec rejected the input as malformed or truncated, or grew its
    /// output past the engine's sanity bound.
    #[error("codec rejected the input buffer")]
    InvalidBuffer,

    /// The codec failed internally.
    #[error("codec failure: {0}")]
    Codec(String),

    /// The codec descriptor provides no usable implementation.
    #[error("codec {0:?} provides no usable implementation")]
    UnableToLoad(String),
}
