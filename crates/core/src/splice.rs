//! Capability-tiered splice dispatch over generic endpoints.
//!
//! # Overview
//!
//! [`splice_custom_codec_with_options`] is the generic form of the splice
//! contract: move bytes from a reader to a writer through a codec, bounding
//! the *uncompressed* side when a non-zero `length` is supplied. Dispatch
//! prefers the richest tier the codec offers:
//!
//! 1. a native [`SpliceCodec`](crate::codec::SpliceCodec) fast path, with
//!    the byte-budget wrappers from [`crate::limit`] applied around the
//!    caller's endpoints when a budget is in force;
//! 2. the incremental stream loop, for codecs with a stream tier;
//! 3. the one-shot accumulator fallback, for codecs that only transform
//!    whole buffers.
//!
//! The memory-mapped strategies only exist for file endpoints and live in
//! [`crate::file`]; they fall back onto the loops in this module whenever a
//! mapping cannot be established.
//!
//! # Invariants
//!
//! - `BufferFull` never escapes: undersized outputs are regrown (doubling
//!   from `next_power_of_two(input) * 8`) until the transform succeeds or
//!   the 1 GiB sanity bound is crossed, which reports
//!   [`Error::InvalidBuffer`].
//! - With a decompression budget, codec output past the budget is discarded
//!   silently; the call still succeeds.
//! - Every exit path releases the per-call scratch buffers and stream state.

use std::env;
use std::io::{Read, Write};
use std::sync::OnceLock;

use tracing::{debug, trace};

use crate::buffer::{try_vec, Accumulator};
use crate::codec::{BufferCodec, BufferResult, Codec, Direction, StreamStatus};
use crate::error::{Error, Result};
use crate::limit::{is_budget_exhausted, LimitedReader, LimitedWriter};
use crate::mmap::splice_buf_size;
use crate::options::Options;
use crate::stream::Stream;

/// Upper bound on any output buffer grown by the doubling strategy.
///
/// Formats without a recorded decompressed size force the engine to guess;
/// doubling past this bound means the input is hostile or corrupt, not
/// merely well compressed.
pub(crate) const OUTPUT_SANITY_CAP: usize = 1 << 30;

/// Initial output guess for decompressing `input_len` bytes of a format
/// that does not record its decompressed size.
pub(crate) fn seed_output_size(input_len: usize) -> usize {
    input_len
        .max(1)
        .checked_next_power_of_two()
        .map_or(OUTPUT_SANITY_CAP, |n| n.saturating_mul(8))
}

/// How eagerly file splices should try memory-mapped windows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum MapPreference {
    /// Never map; always use the buffered loops.
    Never,
    /// Map only for codecs without a stream tier (the default).
    WhenNoStream,
    /// Map whenever the codec has no native splice.
    Always,
}

impl MapPreference {
    /// Environment variable consulted exactly once per process.
    pub(crate) const ENV_VAR: &'static str = "SQUASH_MAP_SPLICE";

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("no") => Self::Never,
            Some("always") => Self::Always,
            // "yes", unset, and unrecognised values share the default.
            _ => Self::WhenNoStream,
        }
    }

    /// The process-wide preference, latched on first use.
    pub(crate) fn get() -> Self {
        static PREFERENCE: OnceLock<MapPreference> = OnceLock::new();

        *PREFERENCE.get_or_init(|| {
            let value = env::var(Self::ENV_VAR).ok();
            let preference = Self::parse(value.as_deref());
            debug!(?preference, "latched mapped-splice preference");
            preference
        })
    }
}

/// Splices between arbitrary reader/writer endpoints through `codec`.
///
/// `length = 0` transfers the entire input (compression) or runs until the
/// codec reports end-of-stream (decompression). A non-zero `length` bounds
/// the uncompressed side: input bytes consumed when compressing, output
/// bytes produced when decompressing, with excess decompression output
/// discarded silently.
///
/// # Errors
///
/// Returns [`Error::UnableToLoad`] for a descriptor with no usable tier,
/// [`Error::Io`] when an endpoint fails, and the codec's own error for
/// malformed input or internal failures.
pub fn splice_custom_codec_with_options<W, R>(
    codec: &Codec,
    direction: Direction,
    writer: &mut W,
    reader: &mut R,
    length: u64,
    options: Option<&Options>,
) -> Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    let defaults;
    let options = match options {
        Some(options) => options,
        None => {
            defaults = Options::default();
            &defaults
        }
    };

    splice_custom(codec, direction, writer, reader, length, options)
}

pub(crate) fn splice_custom<W, R>(
    codec: &Codec,
    direction: Direction,
    writer: &mut W,
    reader: &mut R,
    length: u64,
    options: &Options,
) -> Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    if codec.splice_ops().is_some() {
        splice_native(codec, direction, writer, reader, length, options)
    } else if codec.stream_ops().is_some() {
        splice_stream_loop(codec, direction, writer, reader, length, options)
    } else {
        splice_accumulated(codec, direction, writer, reader, length, options)
    }
}

fn splice_native<W, R>(
    codec: &Codec,
    direction: Direction,
    writer: &mut W,
    reader: &mut R,
    length: u64,
    options: &Options,
) -> Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    let ops = codec
        .splice_ops()
        .ok_or_else(|| Error::UnableToLoad(codec.name().to_string()))?;
    trace!(codec = codec.name(), ?direction, length, "native splice path");

    if length == 0 {
        let mut reader = reader;
        let mut writer = writer;
        return ops.splice(direction, &mut reader, &mut writer, options);
    }

    match direction {
        Direction::Compress => {
            let mut limited = LimitedReader::new(reader, length);
            let mut writer = writer;
            ops.splice(direction, &mut limited, &mut writer, options)
        }
        Direction::Decompress => {
            let mut reader = reader;
            let mut limited = LimitedWriter::new(writer, length);
            match ops.splice(direction, &mut reader, &mut limited, options) {
                // The budget stop is a clean end, not a failure; whatever
                // the codec produced past it is discarded.
                Err(Error::Io(ref err)) if is_budget_exhausted(err) => Ok(()),
                other => other,
            }
        }
    }
}

fn splice_stream_loop<W, R>(
    codec: &Codec,
    direction: Direction,
    writer: &mut W,
    reader: &mut R,
    length: u64,
    options: &Options,
) -> Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    trace!(codec = codec.name(), ?direction, length, "stream splice path");
    let mut stream = Stream::new(codec, direction, options)?;
    let buf_size = splice_buf_size();
    let mut in_buf = try_vec(buf_size)?;
    let mut out_buf = try_vec(buf_size)?;

    let limit_input = direction == Direction::Compress && length != 0;
    let limit_output = direction == Direction::Decompress && length != 0;
    let mut eof = false;

    loop {
        let want = if limit_input {
            let remaining = length - stream.total_in();
            usize::try_from(remaining).unwrap_or(usize::MAX).min(buf_size)
        } else {
            buf_size
        };

        let mut filled = 0;
        if want == 0 {
            eof = true;
        } else {
            match reader.read(&mut in_buf[..want]) {
                Ok(0) => eof = true,
                Ok(read) => filled = read,
                Err(err) => return Err(Error::Io(err)),
            }
        }

        let mut pos = 0;
        loop {
            let progress = if eof {
                stream.finish(&in_buf[pos..filled], &mut out_buf)?
            } else {
                stream.process(&in_buf[pos..filled], &mut out_buf)?
            };
            pos += progress.consumed;

            let mut produced = progress.produced;
            let mut status = progress.status;
            let mut budget_reached = false;
            if limit_output && stream.total_out() > length {
                let overshoot = usize::try_from(stream.total_out() - length).unwrap_or(usize::MAX);
                debug_assert!(overshoot <= produced);
                produced = produced.saturating_sub(overshoot);
                status = StreamStatus::Ok;
                budget_reached = true;
            }

            writer.write_all(&out_buf[..produced]).map_err(Error::Io)?;

            if budget_reached {
                return Ok(());
            }
            match status {
                StreamStatus::Processing => {}
                StreamStatus::EndOfStream => return Ok(()),
                StreamStatus::Ok => {
                    if pos < filled {
                        // The codec stopped short of the bytes we already
                        // hold; feed the remainder before reading more.
                        continue;
                    }
                    if eof {
                        return Ok(());
                    }
                    break;
                }
            }
        }
    }
}

fn splice_accumulated<W, R>(
    codec: &Codec,
    direction: Direction,
    writer: &mut W,
    reader: &mut R,
    length: u64,
    options: &Options,
) -> Result<()>
where
    W: Write + ?Sized,
    R: Read + ?Sized,
{
    let ops = codec
        .buffer_ops()
        .ok_or_else(|| Error::UnableToLoad(codec.name().to_string()))?;
    trace!(codec = codec.name(), ?direction, length, "accumulator splice path");

    let limit_input = direction == Direction::Compress && length != 0;
    let limit_output = direction == Direction::Decompress && length != 0;
    let buf_size = splice_buf_size();

    let mut input = Accumulator::new();
    loop {
        let old = input.len();
        let want = if limit_input {
            let remaining = length - old as u64;
            usize::try_from(remaining).unwrap_or(usize::MAX).min(buf_size)
        } else {
            buf_size
        };
        if want == 0 {
            break;
        }

        input.set_size(old + want)?;
        let read = match reader.read(&mut input.as_mut_slice()[old..old + want]) {
            Ok(read) => read,
            Err(err) => return Err(Error::Io(err)),
        };
        input.truncate(old + read);
        if read == 0 {
            break;
        }
    }

    let transformed = match direction {
        Direction::Compress => {
            let bound = ops.max_compressed_size(input.len());
            let mut output = try_vec(bound)?;
            match ops.compress_buffer(&mut output, input.as_slice(), options)? {
                BufferResult::Complete(written) => {
                    output.truncate(written);
                    output
                }
                BufferResult::BufferFull => {
                    return Err(Error::Codec(
                        "codec overran its own compressed-size bound".to_string(),
                    ));
                }
            }
        }
        Direction::Decompress => decompress_to_vec(codec, ops, input.as_slice(), options)?,
    };

    let mut publish = transformed.len();
    if limit_output {
        publish = publish.min(usize::try_from(length).unwrap_or(usize::MAX));
    }
    writer.write_all(&transformed[..publish]).map_err(Error::Io)?;
    Ok(())
}

/// Decompresses a whole buffer, sizing the output from the recorded length
/// when the codec knows it and by doubling otherwise.
pub(crate) fn decompress_to_vec(
    codec: &Codec,
    ops: &dyn BufferCodec,
    input: &[u8],
    options: &Options,
) -> Result<Vec<u8>> {
    let known = if codec.knows_uncompressed_size() {
        ops.uncompressed_size(input)
    } else {
        None
    };

    if let Some(size) = known {
        let size = usize::try_from(size).map_err(|_| Error::InvalidBuffer)?;
        let mut output = try_vec(size)?;
        return match ops.decompress_buffer(&mut output, input, options)? {
            BufferResult::Complete(written) => {
                output.truncate(written);
                Ok(output)
            }
            // A size-recording codec that still overflows is reporting a
            // corrupt length.
            BufferResult::BufferFull => Err(Error::InvalidBuffer),
        };
    }

    let mut capacity = seed_output_size(input.len());
    loop {
        if capacity > OUTPUT_SANITY_CAP {
            return Err(Error::InvalidBuffer);
        }
        let mut output = try_vec(capacity)?;
        match ops.decompress_buffer(&mut output, input, options)? {
            BufferResult::Complete(written) => {
                output.truncate(written);
                return Ok(output);
            }
            BufferResult::BufferFull => {
                trace!(capacity, "growing decompression output");
                capacity <<= 1;
            }
        }
    }
}
