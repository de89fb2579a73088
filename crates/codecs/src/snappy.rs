//! Snappy back-end built on the `snap` crate.
//!
//! Raw snappy is a pure buffer format: it has no framing to process
//! incrementally, but every compressed block records its decompressed
//! length, so the descriptor advertises the buffer tier only and the
//! knows-uncompressed-size capability.

use snap::raw::{decompress_len, max_compress_len, Decoder, Encoder};
use squash_core::{BufferCodec, BufferResult, Codec, Error, Options, Result};

struct SnappyBuffer;

impl BufferCodec for SnappyBuffer {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        max_compress_len(uncompressed_len)
    }

    fn uncompressed_size(&self, compressed: &[u8]) -> Option<u64> {
        decompress_len(compressed).ok().map(|len| len as u64)
    }

    fn compress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        match Encoder::new().compress(input, output) {
            Ok(written) => Ok(BufferResult::Complete(written)),
            Err(snap::Error::BufferTooSmall { .. }) => Ok(BufferResult::BufferFull),
            Err(err) => Err(Error::Codec(err.to_string())),
        }
    }

    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        match Decoder::new().decompress(input, output) {
            Ok(written) => Ok(BufferResult::Complete(written)),
            Err(snap::Error::BufferTooSmall { .. }) => Ok(BufferResult::BufferFull),
            Err(_) => Err(Error::InvalidBuffer),
        }
    }
}

/// Builds the snappy codec descriptor.
pub fn codec() -> Result<Codec> {
    Codec::builder("snappy")
        .knows_uncompressed_size(true)
        .buffer(SnappyBuffer)
        .build()
}
