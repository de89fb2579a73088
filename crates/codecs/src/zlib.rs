//! Zlib back-end built on `flate2`.
//!
//! Zlib streams do not record their decompressed length, so this back-end
//! never reports one and decompression goes through the engine's doubling
//! strategy. Both the buffer tier and the incremental tier are thin
//! adapters over [`flate2::Compress`] and [`flate2::Decompress`].

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use squash_core::{
    BufferCodec, BufferResult, Codec, CodecStream, CompressionLevel, Direction, Error, Options,
    Result, StreamCodec, StreamProgress, StreamStatus,
};

fn compression_for(options: &Options) -> Compression {
    match options.level().unwrap_or_default() {
        CompressionLevel::Fast => Compression::fast(),
        CompressionLevel::Default => Compression::default(),
        CompressionLevel::Best => Compression::best(),
        // Zlib tops out at 9; clamp the shared numeric range down to it.
        CompressionLevel::Precise(value) => Compression::new(u32::from(value.get()).min(9)),
    }
}

struct ZlibBuffer;

impl BufferCodec for ZlibBuffer {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        // deflateBound for the worst case, plus slack for the zlib wrapper.
        uncompressed_len
            + (uncompressed_len >> 12)
            + (uncompressed_len >> 14)
            + (uncompressed_len >> 25)
            + 32
    }

    fn compress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        options: &Options,
    ) -> Result<BufferResult> {
        let mut state = Compress::new(compression_for(options), true);
        let status = state
            .compress(input, output, FlushCompress::Finish)
            .map_err(|err| Error::Codec(err.to_string()))?;
        match status {
            Status::StreamEnd => Ok(BufferResult::Complete(state.total_out() as usize)),
            Status::Ok | Status::BufError => Ok(BufferResult::BufferFull),
        }
    }

    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        let mut state = Decompress::new(true);
        let status = state
            .decompress(input, output, FlushDecompress::Finish)
            .map_err(|_| Error::InvalidBuffer)?;
        match status {
            Status::StreamEnd => Ok(BufferResult::Complete(state.total_out() as usize)),
            Status::Ok | Status::BufError => {
                if state.total_out() as usize == output.len() {
                    Ok(BufferResult::BufferFull)
                } else {
                    // Output space remains, so the stream must be truncated.
                    Err(Error::InvalidBuffer)
                }
            }
        }
    }
}

enum ZlibState {
    Compress(Compress),
    Decompress(Decompress),
}

struct ZlibStream {
    state: ZlibState,
}

impl CodecStream for ZlibStream {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        match &mut self.state {
            ZlibState::Compress(state) => {
                let before_in = state.total_in();
                let before_out = state.total_out();
                let _status = state
                    .compress(input, output, FlushCompress::None)
                    .map_err(|err| Error::Codec(err.to_string()))?;
                let consumed = (state.total_in() - before_in) as usize;
                let produced = (state.total_out() - before_out) as usize;
                let status = if consumed < input.len() {
                    StreamStatus::Processing
                } else {
                    StreamStatus::Ok
                };
                Ok(StreamProgress {
                    status,
                    consumed,
                    produced,
                })
            }
            ZlibState::Decompress(state) => {
                let before_in = state.total_in();
                let before_out = state.total_out();
                let status = state
                    .decompress(input, output, FlushDecompress::None)
                    .map_err(|_| Error::InvalidBuffer)?;
                let consumed = (state.total_in() - before_in) as usize;
                let produced = (state.total_out() - before_out) as usize;
                let status = match status {
                    Status::StreamEnd => StreamStatus::EndOfStream,
                    _ if consumed < input.len() => StreamStatus::Processing,
                    _ => StreamStatus::Ok,
                };
                Ok(StreamProgress {
                    status,
                    consumed,
                    produced,
                })
            }
        }
    }

    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        match &mut self.state {
            ZlibState::Compress(state) => {
                let before_in = state.total_in();
                let before_out = state.total_out();
                let status = state
                    .compress(input, output, FlushCompress::Finish)
                    .map_err(|err| Error::Codec(err.to_string()))?;
                let consumed = (state.total_in() - before_in) as usize;
                let produced = (state.total_out() - before_out) as usize;
                let status = match status {
                    Status::StreamEnd => StreamStatus::Ok,
                    _ => StreamStatus::Processing,
                };
                Ok(StreamProgress {
                    status,
                    consumed,
                    produced,
                })
            }
            ZlibState::Decompress(state) => {
                let before_in = state.total_in();
                let before_out = state.total_out();
                let status = state
                    .decompress(input, output, FlushDecompress::Finish)
                    .map_err(|_| Error::InvalidBuffer)?;
                let consumed = (state.total_in() - before_in) as usize;
                let produced = (state.total_out() - before_out) as usize;
                match status {
                    Status::StreamEnd => Ok(StreamProgress {
                        status: StreamStatus::EndOfStream,
                        consumed,
                        produced,
                    }),
                    _ if produced == output.len() && !output.is_empty() => Ok(StreamProgress {
                        status: StreamStatus::Processing,
                        consumed,
                        produced,
                    }),
                    // The source ended before the stream did.
                    _ => Err(Error::InvalidBuffer),
                }
            }
        }
    }
}

struct ZlibStreamFactory;

impl StreamCodec for ZlibStreamFactory {
    fn create_stream(
        &self,
        direction: Direction,
        options: &Options,
    ) -> Result<Box<dyn CodecStream>> {
        let state = match direction {
            Direction::Compress => ZlibState::Compress(Compress::new(compression_for(options), true)),
            Direction::Decompress => ZlibState::Decompress(Decompress::new(true)),
        };
        Ok(Box::new(ZlibStream { state }))
    }
}

/// Builds the zlib codec descriptor.
pub fn codec() -> Result<Codec> {
    Codec::builder("zlib")
        .buffer(ZlibBuffer)
        .stream(ZlibStreamFactory)
        .build()
}
