//! Engine-side wrapper around incremental codec streams.
//!
//! [`Stream`] owns the codec-private state produced by
//! [`StreamCodec::create_stream`](crate::codec::StreamCodec::create_stream)
//! and layers the bookkeeping the splice loops rely on: monotonically
//! non-decreasing `total_in`/`total_out` counters and validation of the
//! progress every codec call reports. Codecs only ever see the slices they
//! are handed for one call.

use crate::codec::{Codec, CodecStream, Direction, StreamProgress};
use crate::error::{Error, Result};
use crate::options::Options;

/// An incremental transfer in flight.
pub struct Stream {
    inner: Box<dyn CodecStream>,
    direction: Direction,
    total_in: u64,
    total_out: u64,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("direction", &self.direction)
            .field("total_in", &self.total_in)
            .field("total_out", &self.total_out)
            .finish()
    }
}

impl Stream {
    /// Creates a stream adaptor for `codec` in the given direction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnableToLoad`] when the codec has no stream tier,
    /// or whatever error the back-end raises while allocating its state.
    pub fn new(codec: &Codec, direction: Direction, options: &Options) -> Result<Self> {
        let ops = codec
            .stream_ops()
            .ok_or_else(|| Error::UnableToLoad(codec.name().to_string()))?;

        Ok(Self {
            inner: ops.create_stream(direction, options)?,
            direction,
            total_in: 0,
            total_out: 0,
        })
    }

    /// The transfer direction this stream was created for.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Total bytes consumed from the input side so far.
    #[must_use]
    pub const fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total bytes produced on the output side so far.
    #[must_use]
    pub const fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Feeds `input` and collects transformed bytes into `output`.
    pub fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        let progress = self.inner.process(input, output)?;
        self.account(&progress, input.len(), output.len())?;
        Ok(progress)
    }

    /// Flushes the stream after the final `input` bytes.
    pub fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        let progress = self.inner.finish(input, output)?;
        self.account(&progress, input.len(), output.len())?;
        Ok(progress)
    }

    fn account(&mut self, progress: &StreamProgress, in_len: usize, out_len: usize) -> Result<()> {
        if progress.consumed > in_len || progress.produced > out_len {
            return Err(Error::Codec(
                "stream reported progress beyond the provided buffers".to_string(),
            ));
        }

        self.total_in += progress.consumed as u64;
        self.total_out += progress.produced as u64;
        Ok(())
    }
}
