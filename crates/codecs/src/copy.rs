//! Passthrough codec.
//!
//! Copies bytes unchanged in both directions. Useful for benchmarking the
//! transport without a transform, and as the one bundled back-end with a
//! native splice tier, so the engine's fast path (and the byte-budget
//! wrappers around it) stay exercised.

use std::io::{self, Read, Write};

use squash_core::{
    BufferCodec, BufferResult, Codec, Direction, Options, Result, SpliceCodec,
};

struct CopyBuffer;

impl BufferCodec for CopyBuffer {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        uncompressed_len
    }

    fn uncompressed_size(&self, compressed: &[u8]) -> Option<u64> {
        Some(compressed.len() as u64)
    }

    fn compress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        if output.len() < input.len() {
            return Ok(BufferResult::BufferFull);
        }
        output[..input.len()].copy_from_slice(input);
        Ok(BufferResult::Complete(input.len()))
    }

    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        options: &Options,
    ) -> Result<BufferResult> {
        self.compress_buffer(output, input, options)
    }
}

struct CopySplice;

impl SpliceCodec for CopySplice {
    fn splice(
        &self,
        _direction: Direction,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
        _options: &Options,
    ) -> Result<()> {
        io::copy(reader, writer)?;
        Ok(())
    }
}

/// Builds the passthrough codec descriptor.
pub fn codec() -> Result<Codec> {
    Codec::builder("copy")
        .knows_uncompressed_size(true)
        .buffer(CopyBuffer)
        .splice(CopySplice)
        .build()
}
