//! Dispatcher behaviour over generic endpoints, exercised with purpose-built
//! mock codecs so every capability tier and budget rule is observable.

use std::io::{self, Read, Write};

use squash_core::{
    splice_custom_codec_with_options, BufferCodec, BufferResult, Codec, CodecStream, Direction,
    Error, Options, Result, SpliceCodec, StreamCodec, StreamProgress, StreamStatus,
};

// ============================================================================
// Mock codecs
// ============================================================================

/// Identity buffer transform; optionally reports the decompressed size.
struct Passthrough {
    knows_size: bool,
}

impl BufferCodec for Passthrough {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        uncompressed_len + 1
    }

    fn uncompressed_size(&self, compressed: &[u8]) -> Option<u64> {
        self.knows_size.then_some(compressed.len() as u64)
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

/// "Decompression" that expands every input byte 32-fold, without recording
/// the output size. Forces the doubling strategy through several rounds.
struct Expand32;

impl BufferCodec for Expand32 {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        uncompressed_len
    }

    fn compress_buffer(
        &self,
        _output: &mut [u8],
        _input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        Ok(BufferResult::Complete(0))
    }

    fn decompress_buffer(
        &self,
        output: &mut [u8],
        input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        let need = input.len() * 32;
        if output.len() < need {
            return Ok(BufferResult::BufferFull);
        }
        for (chunk, byte) in output[..need].chunks_mut(32).zip(input) {
            chunk.fill(*byte);
        }
        Ok(BufferResult::Complete(need))
    }
}

/// Decompression that never fits, no matter how large the output grows.
struct NeverFits;

impl BufferCodec for NeverFits {
    fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
        uncompressed_len
    }

    fn compress_buffer(
        &self,
        _output: &mut [u8],
        _input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        Ok(BufferResult::Complete(0))
    }

    fn decompress_buffer(
        &self,
        _output: &mut [u8],
        _input: &[u8],
        _options: &Options,
    ) -> Result<BufferResult> {
        Ok(BufferResult::BufferFull)
    }
}

/// Incremental identity stream.
struct CopyStream;

impl CodecStream for CopyStream {
    fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        let status = if n < input.len() {
            StreamStatus::Processing
        } else {
            StreamStatus::Ok
        };
        Ok(StreamProgress {
            status,
            consumed: n,
            produced: n,
        })
    }

    fn finish(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamProgress> {
        let mut progress = self.process(input, output)?;
        if progress.status == StreamStatus::Ok {
            progress.status = StreamStatus::EndOfStream;
        }
        Ok(progress)
    }
}

struct CopyStreamFactory;

impl StreamCodec for CopyStreamFactory {
    fn create_stream(
        &self,
        _direction: Direction,
        _options: &Options,
    ) -> Result<Box<dyn CodecStream>> {
        Ok(Box::new(CopyStream))
    }
}

/// Native splice tier that simply copies.
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

fn buffer_codec(knows_size: bool) -> Codec {
    Codec::builder("mock-buffer")
        .knows_uncompressed_size(knows_size)
        .buffer(Passthrough { knows_size })
        .build()
        .unwrap()
}

fn stream_codec() -> Codec {
    Codec::builder("mock-stream")
        .stream(CopyStreamFactory)
        .build()
        .unwrap()
}

fn native_codec() -> Codec {
    Codec::builder("mock-native")
        .splice(CopySplice)
        .build()
        .unwrap()
}

/// Reader that serves fixed-size chunks and fails with an I/O error on a
/// chosen invocation.
struct FailingReader {
    calls: usize,
    fail_on: usize,
    chunk: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        if self.calls == self.fail_on {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "injected"));
        }
        let n = self.chunk.min(buf.len());
        buf[..n].fill(b'x');
        Ok(n)
    }
}

fn splice(
    codec: &Codec,
    direction: Direction,
    source: &[u8],
    length: u64,
) -> Result<Vec<u8>> {
    let mut reader = source;
    let mut sink = Vec::new();
    splice_custom_codec_with_options(codec, direction, &mut sink, &mut reader, length, None)?;
    Ok(sink)
}

// ============================================================================
// Accumulator path
// ============================================================================

#[test]
fn accumulator_round_trips_identity_payloads() {
    let payload = b"one-shot accumulator payload".repeat(100);
    let codec = buffer_codec(false);

    let compressed = splice(&codec, Direction::Compress, &payload, 0).unwrap();
    assert_eq!(compressed, payload);
    let restored = splice(&codec, Direction::Decompress, &compressed, 0).unwrap();
    assert_eq!(restored, payload);
}

#[test]
fn accumulator_handles_empty_input() {
    let codec = buffer_codec(true);
    assert_eq!(splice(&codec, Direction::Compress, b"", 0).unwrap(), b"");
    assert_eq!(splice(&codec, Direction::Decompress, b"", 0).unwrap(), b"");
}

#[test]
fn accumulator_budget_limits_compression_input() {
    let payload = b"0123456789abcdef";
    let codec = buffer_codec(false);

    let mut reader = &payload[..];
    let mut sink = Vec::new();
    splice_custom_codec_with_options(&codec, Direction::Compress, &mut sink, &mut reader, 5, None)
        .unwrap();

    assert_eq!(sink, b"01234");
    // Exactly five bytes were consumed from the source.
    assert_eq!(reader.len(), payload.len() - 5);
}

#[test]
fn accumulator_budget_truncates_decompression_output() {
    let payload = b"0123456789abcdef";
    let codec = buffer_codec(true);

    let sink = splice(&codec, Direction::Decompress, payload, 3).unwrap();
    assert_eq!(sink, b"012");
}

#[test]
fn unknowing_decompression_grows_by_doubling() {
    let input = vec![7u8; 4096];
    let codec = Codec::builder("expand32")
        .buffer(Expand32)
        .build()
        .unwrap();

    let output = splice(&codec, Direction::Decompress, &input, 0).unwrap();
    assert_eq!(output.len(), input.len() * 32);
    assert!(output.iter().all(|&b| b == 7));
}

#[test]
fn runaway_doubling_is_reported_as_invalid_buffer() {
    let codec = Codec::builder("never-fits")
        .buffer(NeverFits)
        .build()
        .unwrap();

    let err = splice(&codec, Direction::Decompress, b"tiny", 0).unwrap_err();
    assert!(matches!(err, Error::InvalidBuffer));
}

#[test]
fn knowing_codec_with_lying_size_is_invalid() {
    struct LyingSize;

    impl BufferCodec for LyingSize {
        fn max_compressed_size(&self, n: usize) -> usize {
            n
        }
        fn uncompressed_size(&self, compressed: &[u8]) -> Option<u64> {
            Some(compressed.len() as u64 / 2)
        }
        fn compress_buffer(
            &self,
            _output: &mut [u8],
            _input: &[u8],
            _options: &Options,
        ) -> Result<BufferResult> {
            Ok(BufferResult::Complete(0))
        }
        fn decompress_buffer(
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
    }

    let codec = Codec::builder("liar")
        .knows_uncompressed_size(true)
        .buffer(LyingSize)
        .build()
        .unwrap();

    let err = splice(&codec, Direction::Decompress, b"0123456789", 0).unwrap_err();
    assert!(matches!(err, Error::InvalidBuffer));
}

#[test]
fn read_failure_on_third_call_propagates_verbatim() {
    let codec = buffer_codec(false);
    let mut reader = FailingReader {
        calls: 0,
        fail_on: 3,
        chunk: 10,
    };
    let mut sink = Vec::new();

    let err = splice_custom_codec_with_options(
        &codec,
        Direction::Compress,
        &mut sink,
        &mut reader,
        0,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::ConnectionAborted));
    // Nothing was committed to the sink before the failure.
    assert!(sink.is_empty());
}

// ============================================================================
// Stream loop path
// ============================================================================

#[test]
fn stream_loop_round_trips_unaligned_payloads() {
    // Deliberately not a multiple of the scratch buffer size.
    let payload: Vec<u8> = (0..10_007).map(|i| (i % 251) as u8).collect();
    let codec = stream_codec();

    let compressed = splice(&codec, Direction::Compress, &payload, 0).unwrap();
    assert_eq!(compressed, payload);
    let restored = splice(&codec, Direction::Decompress, &compressed, 0).unwrap();
    assert_eq!(restored, payload);
}

#[test]
fn stream_loop_budget_limits_compression_input() {
    let payload = vec![b'a'; 8192];
    let codec = stream_codec();

    let mut reader = &payload[..];
    let mut sink = Vec::new();
    splice_custom_codec_with_options(
        &codec,
        Direction::Compress,
        &mut sink,
        &mut reader,
        1000,
        None,
    )
    .unwrap();

    assert_eq!(sink.len(), 1000);
    assert_eq!(reader.len(), payload.len() - 1000);
}

#[test]
fn stream_loop_budget_truncates_decompression_output() {
    let payload = vec![b'A'; 4096];
    let codec = stream_codec();

    let sink = splice(&codec, Direction::Decompress, &payload, 100).unwrap();
    assert_eq!(sink, vec![b'A'; 100]);
}

#[test]
fn stream_loop_handles_empty_input() {
    let codec = stream_codec();
    assert_eq!(splice(&codec, Direction::Compress, b"", 0).unwrap(), b"");
}

#[test]
fn stream_loop_read_failure_aborts() {
    let codec = stream_codec();
    let mut reader = FailingReader {
        calls: 0,
        fail_on: 3,
        chunk: 100,
    };
    let mut sink = Vec::new();

    let err = splice_custom_codec_with_options(
        &codec,
        Direction::Compress,
        &mut sink,
        &mut reader,
        0,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::ConnectionAborted));
    // The identity stream echoes as it goes, so the bytes read before the
    // failure were already committed. Partial output is allowed here.
    assert_eq!(sink.len(), 200);
}

// ============================================================================
// Native splice path
// ============================================================================

#[test]
fn native_splice_runs_without_budget() {
    let payload = b"native payload".repeat(50);
    let codec = native_codec();

    let sink = splice(&codec, Direction::Compress, &payload, 0).unwrap();
    assert_eq!(sink, payload);
}

#[test]
fn native_splice_budget_limits_compression_input() {
    let payload = vec![b'n'; 512];
    let codec = native_codec();

    let mut reader = &payload[..];
    let mut sink = Vec::new();
    splice_custom_codec_with_options(&codec, Direction::Compress, &mut sink, &mut reader, 7, None)
        .unwrap();

    assert_eq!(sink.len(), 7);
    assert_eq!(reader.len(), payload.len() - 7);
}

#[test]
fn native_splice_budget_truncates_decompression_output() {
    let payload = vec![b'n'; 512];
    let codec = native_codec();

    let sink = splice(&codec, Direction::Decompress, &payload, 7).unwrap();
    assert_eq!(sink.len(), 7);
}
