//! LZ4 back-end built on `lz4_flex`.
//!
//! Uses the raw block format, which carries neither framing nor a recorded
//! decompressed length: the descriptor is buffer-only and unknowing, making
//! this the back-end that leans hardest on the engine's accumulator and
//! output-doubling machinery.

use lz4_flex::block::{compress_into, decompress_into, get_maximum_output_size, DecompressError};
use squash_core::{BufferCodec, BufferResult, Codec, Error, Options, Result};

struct Lz4Buffer;

impl BufferCodec for Lz4Buffer {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        get_maximum_output_size(uncompressed_len)
    }

    fn compress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        match compress_into(input, output) {
            Ok(written) => Ok(BufferResult::Complete(written)),
            // Raw block compression only fails for lack of output space.
            Err(_) => Ok(BufferResult::BufferFull),
        }
    }

    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        match decompress_into(input, output) {
            Ok(written) => Ok(BufferResult::Complete(written)),
            Err(DecompressError::OutputTooSmall { .. }) => Ok(BufferResult::BufferFull),
            Err(_) => Err(Error::InvalidBuffer),
        }
    }
}

/// Builds the lz4 codec descriptor.
pub fn codec() -> Result<Codec> {
    Codec::builder("lz4").buffer(Lz4Buffer).build()
}
