//! Zstandard back-end built on the `zstd` crate.
//!
//! Zstd gets both tiers: one-shot transforms via `zstd::bulk` (whose frames
//! record the content size, enabling exact output sizing on decompression)
//! and an incremental processor via `zstd::stream::raw`. Frames produced by
//! the streaming tier do not record their content size, which is why
//! [`BufferCodec::uncompressed_size`] reports per-buffer rather than
//! per-format knowledge.

use squash_core::{
    BufferCodec, BufferResult, Codec, CodecStream, CompressionLevel, Direction, Error, Options,
    Result, StreamCodec, StreamProgress, StreamStatus,
};
use zstd::stream::raw::{Decoder, Encoder, InBuffer, Operation, OutBuffer};
use zstd::zstd_safe;

fn level_for(options: &Options) -> i32 {
    match options.level().unwrap_or_default() {
        CompressionLevel::Fast => 1,
        CompressionLevel::Default => 3,
        CompressionLevel::Best => 19,
        CompressionLevel::Precise(value) => i32::from(value.get()),
    }
}

fn codec_error(err: std::io::Error) -> Error {
    Error::Codec(err.to_string())
}

struct ZstdBuffer;

impl BufferCodec for ZstdBuffer {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        zstd_safe::compress_bound(uncompressed_len)
    }

    fn uncompressed_size(&self, compressed: &[u8]) -> Option<u64> {
        zstd_safe::get_frame_content_size(compressed).ok().flatten()
    }

    fn compress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        options: &Options,
    ) -> Result<BufferResult> {
        if output.len() < zstd_safe::compress_bound(input.len()) {
            return Ok(BufferResult::BufferFull);
        }
        let written = zstd::bulk::compress_to_buffer(input, output, level_for(options))
            .map_err(codec_error)?;
        Ok(BufferResult::Complete(written))
    }

    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        let mut decoder = Decoder::new().map_err(codec_error)?;
        let out_len = output.len();
        let mut in_buffer = InBuffer::around(input);
        let mut out_buffer = OutBuffer::around(output);

        loop {
            let hint = decoder
                .run(&mut in_buffer, &mut out_buffer)
                .map_err(|_| Error::InvalidBuffer)?;
            if hint == 0 {
                return Ok(BufferResult::Complete(out_buffer.pos()));
            }
            if out_buffer.pos() == out_len {
                return Ok(BufferResult::BufferFull);
            }
            if in_buffer.pos == input.len() {
                // Everything consumed but the frame is incomplete.
                return Err(Error::InvalidBuffer);
            }
        }
    }
}

enum ZstdState {
    Compress(Encoder<'static>),
    Decompress(Decoder<'static>),
}

struct ZstdStream {
    state: ZstdState,
}

impl CodecStream for ZstdStream {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        let out_len = output.len();
        let mut in_buffer = InBuffer::around(input);
        let mut out_buffer = OutBuffer::around(output);

        match &mut self.state {
            ZstdState::Compress(encoder) => {
                encoder
                    .run(&mut in_buffer, &mut out_buffer)
                    .map_err(codec_error)?;
                let produced = out_buffer.pos();
                let status = if produced == out_len && out_len != 0 {
                    StreamStatus::Processing
                } else {
                    StreamStatus::Ok
                };
                Ok(StreamProgress {
                    status,
                    consumed: in_buffer.pos,
                    produced,
                })
            }
            ZstdState::Decompress(decoder) => {
                let hint = decoder
                    .run(&mut in_buffer, &mut out_buffer)
                    .map_err(|_| Error::InvalidBuffer)?;
                let produced = out_buffer.pos();
                let status = if hint == 0 {
                    StreamStatus::EndOfStream
                } else if produced == out_len && out_len != 0 {
                    StreamStatus::Processing
                } else {
                    StreamStatus::Ok
                };
                Ok(StreamProgress {
                    status,
                    consumed: in_buffer.pos,
                    produced,
                })
            }
        }
    }

    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        let out_len = output.len();
        let mut in_buffer = InBuffer::around(input);
        let mut out_buffer = OutBuffer::around(output);

        match &mut self.state {
            ZstdState::Compress(encoder) => {
                if !input.is_empty() {
                    encoder
                        .run(&mut in_buffer, &mut out_buffer)
                        .map_err(codec_error)?;
                    if in_buffer.pos < input.len()
                        || (out_buffer.pos() == out_len && out_len != 0)
                    {
                        return Ok(StreamProgress {
                            status: StreamStatus::Processing,
                            consumed: in_buffer.pos,
                            produced: out_buffer.pos(),
                        });
                    }
                }

                let hint = encoder.finish(&mut out_buffer, true).map_err(codec_error)?;
                let status = if hint == 0 {
                    StreamStatus::Ok
                } else {
                    StreamStatus::Processing
                };
                Ok(StreamProgress {
                    status,
                    consumed: in_buffer.pos,
                    produced: out_buffer.pos(),
                })
            }
            ZstdState::Decompress(decoder) => {
                if !input.is_empty() {
                    let hint = decoder
                        .run(&mut in_buffer, &mut out_buffer)
                        .map_err(|_| Error::InvalidBuffer)?;
                    if hint == 0 {
                        return Ok(StreamProgress {
                            status: StreamStatus::EndOfStream,
                            consumed: in_buffer.pos,
                            produced: out_buffer.pos(),
                        });
                    }
                    if in_buffer.pos < input.len()
                        || (out_buffer.pos() == out_len && out_len != 0)
                    {
                        return Ok(StreamProgress {
                            status: StreamStatus::Processing,
                            consumed: in_buffer.pos,
                            produced: out_buffer.pos(),
                        });
                    }
                }
                // The source ended before the frame did.
                Err(Error::InvalidBuffer)
            }
        }
    }
}

struct ZstdStreamFactory;

impl StreamCodec for ZstdStreamFactory {
    fn create_stream(
        &self,
        direction: Direction,
        options: &Options,
    ) -> Result<Box<dyn CodecStream>> {
        let state = match direction {
            Direction::Compress => {
                ZstdState::Compress(Encoder::new(level_for(options)).map_err(codec_error)?)
            }
            Direction::Decompress => ZstdState::Decompress(Decoder::new().map_err(codec_error)?),
        };
        Ok(Box::new(ZstdStream { state }))
    }
}

/// Builds the zstd codec descriptor.
pub fn codec() -> Result<Codec> {
    Codec::builder("zstd")
        .knows_uncompressed_size(true)
        .buffer(ZstdBuffer)
        .stream(ZstdStreamFactory)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_round_trip_records_content_size() {
        let payload = b"zstandard payload ".repeat(64);
        let options = Options::default();
        let ops = ZstdBuffer;

        let mut compressed = vec![0u8; ops.max_compressed_size(payload.len())];
        let BufferResult::Complete(clen) = ops
            .compress_buffer(&mut compressed, &payload, &options)
            .unwrap()
        else {
            panic!("bound-sized output reported full");
        };

        assert_eq!(
            ops.uncompressed_size(&compressed[..clen]),
            Some(payload.len() as u64)
        );

        let mut restored = vec![0u8; payload.len()];
        let BufferResult::Complete(dlen) = ops
            .decompress_buffer(&mut restored, &compressed[..clen], &options)
            .unwrap()
        else {
            panic!("exact-sized output reported full");
        };
        assert_eq!(&restored[..dlen], &payload[..]);
    }

    #[test]
    fn undersized_decompression_output_reports_buffer_full() {
        let payload = vec![9u8; 4096];
        let options = Options::default();
        let ops = ZstdBuffer;

        let mut compressed = vec![0u8; ops.max_compressed_size(payload.len())];
        let BufferResult::Complete(clen) = ops
            .compress_buffer(&mut compressed, &payload, &options)
            .unwrap()
        else {
            panic!("compression failed");
        };

        let mut tiny = vec![0u8; 16];
        let result = ops
            .decompress_buffer(&mut tiny, &compressed[..clen], &options)
            .unwrap();
        assert_eq!(result, BufferResult::BufferFull);
    }

    #[test]
    fn truncated_frame_is_invalid() {
        let payload = b"truncate me".repeat(100);
        let options = Options::default();
        let ops = ZstdBuffer;

        let mut compressed = vec![0u8; ops.max_compressed_size(payload.len())];
        let BufferResult::Complete(clen) = ops
            .compress_buffer(&mut compressed, &payload, &options)
            .unwrap()
        else {
            panic!("compression failed");
        };

        let mut output = vec![0u8; payload.len()];
        let err = ops
            .decompress_buffer(&mut output, &compressed[..clen / 2], &options)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBuffer));
    }

    #[test]
    fn stream_round_trip() {
        use squash_core::splice_custom_codec_with_options;

        let payload: Vec<u8> = (0..65_536).map(|i| (i % 253) as u8).collect();
        let codec = codec().unwrap();

        let mut compressed = Vec::new();
        splice_custom_codec_with_options(
            &codec,
            Direction::Compress,
            &mut compressed,
            &mut &payload[..],
            0,
            None,
        )
        .unwrap();
        assert_eq!(&compressed[..4], &[0x28, 0xB5, 0x2F, 0xFD]);

        let mut restored = Vec::new();
        splice_custom_codec_with_options(
            &codec,
            Direction::Decompress,
            &mut restored,
            &mut &compressed[..],
            0,
            None,
        )
        .unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn level_mapping_follows_presets() {
        assert_eq!(level_for(&Options::default()), 3);
        assert_eq!(
            level_for(&Options::builder().level(CompressionLevel::Fast).build()),
            1
        );
        assert_eq!(
            level_for(&Options::builder().level(CompressionLevel::Best).build()),
            19
        );
    }
}
