//! Codec descriptors and the capability traits back-ends implement.
//!
//! # Overview
//!
//! A [`Codec`] is an immutable descriptor pairing a unique name with up to
//! three independently optional capability tiers:
//!
//! - [`BufferCodec`] — one-shot transforms over caller-provided buffers;
//! - [`StreamCodec`] — an incremental processor with input/output cursors
//!   and a `process`/`finish` protocol;
//! - [`SpliceCodec`] — a native fast path that moves bytes between a reader
//!   and a writer without the engine's generic loops.
//!
//! At least one tier must be present; [`CodecBuilder::build`] enforces this.
//! The splice engine inspects the available tiers at run time and picks the
//! best execution path, so back-ends only implement what their underlying
//! library supports.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::options::Options;

/// Whether a splice compresses or decompresses the transferred bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Source bytes are uncompressed; the sink receives the encoded stream.
    Compress,
    /// Source bytes are an encoded stream; the sink receives plain bytes.
    Decompress,
}

/// Outcome of a one-shot buffer transform.
///
/// `BufferFull` is a control-flow signal, not an error: the engine resolves
/// it internally by growing the output buffer and retrying, and it is never
/// surfaced to callers of the public entry points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BufferResult {
    /// The transform succeeded and wrote this many bytes.
    Complete(usize),
    /// The output buffer was too small to hold the result.
    BufferFull,
}

/// Progress reported by one [`CodecStream::process`] or
/// [`CodecStream::finish`] call.
#[derive(Clone, Copy, Debug)]
pub struct StreamProgress {
    /// What the codec wants next.
    pub status: StreamStatus,
    /// Bytes consumed from the input slice.
    pub consumed: usize,
    /// Bytes written to the output slice.
    pub produced: usize,
}

/// Three-valued progress result of the incremental protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamStatus {
    /// The call made progress; feed more input (or, on `finish`, the stream
    /// is fully flushed).
    Ok,
    /// More output is pending for input already consumed; call again with a
    /// fresh output slot before feeding anything new.
    Processing,
    /// The codec observed the logical end of the encoded stream.
    EndOfStream,
}

/// One-shot buffer transforms.
pub trait BufferCodec: Send + Sync {
    /// Upper bound on the encoded size of `uncompressed_len` input bytes.
    ///
    /// The engine allocates compression output with exactly this size, so
    /// the bound must be safe for every input, including the empty one.
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize;

    /// Reports the exact decompressed length of `compressed`, when the
    /// format records it.
    ///
    /// Only consulted when the descriptor's knows-uncompressed-size flag is
    /// set. Returning `None` demotes the call site to the size-doubling
    /// strategy used for formats without a recorded length.
    fn uncompressed_size(&self, compressed: &[u8]) -> Option<u64> {
        let _ = compressed;
        None
    }

    /// Compresses `input` into `output`.
    fn compress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        options: &Options,
    ) -> Result<BufferResult>;

    /// Decompresses `input` into `output`.
    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        options: &Options,
    ) -> Result<BufferResult>;
}

/// Factory for incremental codec streams.
pub trait StreamCodec: Send + Sync {
    /// Creates a fresh stream state for one transfer in `direction`.
    fn create_stream(&self, direction: Direction, options: &Options)
        -> Result<Box<dyn CodecStream>>;
}

/// Incremental codec state created by [`StreamCodec::create_stream`].
///
/// Implementations may only touch the slices passed to each call; cross-call
/// bookkeeping (running totals, budget clamping) is owned by the engine's
/// [`crate::stream::Stream`] wrapper.
pub trait CodecStream: Send {
    /// Consumes bytes from `input` and writes transformed bytes to `output`.
    ///
    /// Returns [`StreamStatus::Ok`] once all consumable input has been taken
    /// and the codec wants more, [`StreamStatus::Processing`] when output
    /// remains pending for input already consumed, and
    /// [`StreamStatus::EndOfStream`] when decoding reached the end of the
    /// encoded stream.
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress>;

    /// Flushes the stream after the last input bytes.
    ///
    /// `input` carries any bytes read but not yet consumed when end-of-input
    /// was observed. Returns [`StreamStatus::Processing`] while flush output
    /// remains, and [`StreamStatus::Ok`] (or [`StreamStatus::EndOfStream`]
    /// for decoders) once the stream is complete.
    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress>;
}

/// Native splice fast path.
pub trait SpliceCodec: Send + Sync {
    /// Moves bytes from `reader` to `writer`, applying the codec transform.
    ///
    /// Byte budgets are enforced by the engine before this is called: the
    /// limited side of the transfer is already wrapped, so implementations
    /// simply run until `reader` is exhausted or an error occurs.
    fn splice(
        &self,
        direction: Direction,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        options: &Options,
    ) -> Result<()>;
}

/// Immutable codec descriptor.
///
/// Cheap to clone; the capability objects are shared.
#[derive(Clone)]
pub struct Codec {
    name: String,
    knows_uncompressed_size: bool,
    buffer: Option<Arc<dyn BufferCodec>>,
    stream: Option<Arc<dyn StreamCodec>>,
    splice: Option<Arc<dyn SpliceCodec>>,
}

impl Codec {
    /// Starts building a descriptor with the given unique name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CodecBuilder {
        CodecBuilder {
            name: name.into(),
            knows_uncompressed_size: false,
            buffer: None,
            stream: None,
            splice: None,
        }
    }

    /// The codec's registry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the format records the exact decompressed length.
    #[must_use]
    pub const fn knows_uncompressed_size(&self) -> bool {
        self.knows_uncompressed_size
    }

    /// The one-shot buffer tier, when implemented.
    #[must_use]
    pub fn buffer_ops(&self) -> Option<&dyn BufferCodec> {
        self.buffer.as_deref()
    }

    /// The incremental stream tier, when implemented.
    #[must_use]
    pub fn stream_ops(&self) -> Option<&dyn StreamCodec> {
        self.stream.as_deref()
    }

    /// The native splice tier, when implemented.
    #[must_use]
    pub fn splice_ops(&self) -> Option<&dyn SpliceCodec> {
        self.splice.as_deref()
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("name", &self.name)
            .field("knows_uncompressed_size", &self.knows_uncompressed_size)
            .field("buffer", &self.buffer.is_some())
            .field("stream", &self.stream.is_some())
            .field("splice", &self.splice.is_some())
            .finish()
    }
}

/// Builder for [`Codec`] descriptors.
pub struct CodecBuilder {
    name: String,
    knows_uncompressed_size: bool,
    buffer: Option<Arc<dyn BufferCodec>>,
    stream: Option<Arc<dyn StreamCodec>>,
    splice: Option<Arc<dyn SpliceCodec>>,
}

impl CodecBuilder {
    /// Marks the format as recording its decompressed length.
    #[must_use]
    pub fn knows_uncompressed_size(mut self, knows: bool) -> Self {
        self.knows_uncompressed_size = knows;
        self
    }

    /// Installs the one-shot buffer tier.
    #[must_use]
    pub fn buffer(mut self, ops: impl BufferCodec + 'static) -> Self {
        self.buffer = Some(Arc::new(ops));
        self
    }

    /// Installs the incremental stream tier.
    #[must_use]
    pub fn stream(mut self, ops: impl StreamCodec + 'static) -> Self {
        self.stream = Some(Arc::new(ops));
        self
    }

    /// Installs the native splice tier.
    #[must_use]
    pub fn splice(mut self, ops: impl SpliceCodec + 'static) -> Self {
        self.splice = Some(Arc::new(ops));
        self
    }

    /// Finishes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnableToLoad`] when no capability tier was installed.
    pub fn build(self) -> Result<Codec> {
        if self.buffer.is_none() && self.stream.is_none() && self.splice.is_none() {
            return Err(Error::UnableToLoad(self.name));
        }

        Ok(Codec {
            name: self.name,
            knows_uncompressed_size: self.knows_uncompressed_size,
            buffer: self.buffer,
            stream: self.stream,
            splice: self.splice,
        })
    }
}
