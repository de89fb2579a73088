//! File-backed splicing: locking, mapped strategies, and the public file
//! entry points.
//!
//! # Overview
//!
//! This module adapts two [`File`] endpoints to the generic splice contract
//! and layers the file-only strategies on top:
//!
//! - a **mapped one-shot** path that windows both endpoints and runs the
//!   codec's buffer transform in place;
//! - a **mapped stream** variant of the incremental loop that windows one
//!   endpoint per block instead of copying through scratch buffers;
//! - the buffered loops from [`crate::splice`], used directly as the final
//!   fallback.
//!
//! Strategy selection follows the process-wide mapped-splice preference
//! (environment variable `SQUASH_MAP_SPLICE`, latched on first use). Any
//! failure to establish a first mapping falls back transparently to the
//! buffered loops; once block mapping has succeeded, a later failure ends
//! the mapped loop cleanly instead.
//!
//! Both endpoints are held under exclusive advisory locks for the whole
//! call, so interleaved splices from other threads on the same handles
//! cannot corrupt the stream positions. Locks are released on every exit
//! path.

use std::fs::File;
use std::io::{Read, Write};

use fs2::FileExt;
use tracing::{debug, trace};

use crate::buffer::try_vec;
use crate::codec::{BufferResult, Codec, Direction, StreamStatus};
use crate::error::{Error, Result};
use crate::mmap::{self, splice_buf_size, ReadWindow, WriteWindow};
use crate::options::Options;
use crate::splice::{self, seed_output_size, MapPreference, OUTPUT_SANITY_CAP};
use crate::stream::Stream;

/// Block size for the per-block mapped stream variant.
const FILE_BLOCK_SIZE: u64 = 1 << 20;

/// Exclusive advisory lock on a file, released on drop.
///
/// The lock is taken through a duplicated handle so the original may keep
/// being borrowed mutably while the guard is alive.
struct LockGuard {
    handle: File,
}

impl LockGuard {
    fn acquire(file: &File) -> Result<Self> {
        let handle = file.try_clone()?;
        handle.lock_exclusive()?;
        Ok(Self { handle })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.handle.unlock();
    }
}

enum MappedOutcome {
    Done,
    Unmappable,
}

/// Splices between two files through `codec` with default options.
pub fn splice_codec(
    codec: &Codec,
    direction: Direction,
    dst: &mut File,
    src: &mut File,
    length: u64,
) -> Result<()> {
    splice_codec_with_options(codec, direction, dst, src, length, None)
}

/// Splices between two files through `codec`.
///
/// Transfers bytes from `src` to `dst`, compressing or decompressing per
/// `direction`. `length = 0` transfers the entire input; otherwise `length`
/// bounds the uncompressed side of the transfer. On success the stream
/// positions of both files have advanced past the spliced ranges and all
/// output has been flushed or committed.
///
/// # Errors
///
/// Returns [`Error::Io`] for endpoint failures, [`Error::InvalidBuffer`]
/// for input the codec rejects, and [`Error::Codec`] for internal codec
/// failures. Partial output may remain in `dst` after an error; the
/// contract does not require atomicity.
pub fn splice_codec_with_options(
    codec: &Codec,
    direction: Direction,
    dst: &mut File,
    src: &mut File,
    length: u64,
    options: Option<&Options>,
) -> Result<()> {
    let defaults;
    let options = match options {
        Some(options) => options,
        None => {
            defaults = Options::default();
            &defaults
        }
    };

    let _src_lock = LockGuard::acquire(src)?;
    let _dst_lock = LockGuard::acquire(dst)?;

    if codec.splice_ops().is_some() {
        return splice::splice_custom(codec, direction, dst, src, length, options);
    }

    let preference = MapPreference::get();
    let try_one_shot = codec.buffer_ops().is_some()
        && (preference == MapPreference::Always
            || (preference == MapPreference::WhenNoStream && codec.stream_ops().is_none()));

    if try_one_shot {
        match splice_map(codec, direction, dst, src, length, options) {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(
                    codec = codec.name(),
                    error = %err,
                    "mapped one-shot splice failed, falling back"
                );
            }
        }
    }

    if codec.stream_ops().is_some() && preference == MapPreference::Always {
        match splice_stream_mapped(codec, direction, dst, src, length, options)? {
            MappedOutcome::Done => return Ok(()),
            MappedOutcome::Unmappable => {}
        }
    }

    splice::splice_custom(codec, direction, dst, src, length, options)
}

/// Mapped one-shot strategy: window both files and transform in place.
fn splice_map(
    codec: &Codec,
    direction: Direction,
    dst: &File,
    src: &File,
    length: u64,
    options: &Options,
) -> Result<()> {
    let ops = codec
        .buffer_ops()
        .ok_or_else(|| Error::UnableToLoad(codec.name().to_string()))?;
    trace!(codec = codec.name(), ?direction, length, "mapped one-shot path");

    match direction {
        Direction::Compress => {
            let input = ReadWindow::map(src, (length != 0).then_some(length))?;
            let bound = ops.max_compressed_size(input.len());
            let mut output = WriteWindow::map(dst, bound as u64)?;

            match ops.compress_buffer(output.data(), input.data(), options)? {
                BufferResult::Complete(written) => {
                    input.commit()?;
                    output.commit(written as u64)?;
                    Ok(())
                }
                BufferResult::BufferFull => Err(Error::Codec(
                    "codec overran its own compressed-size bound".to_string(),
                )),
            }
        }
        Direction::Decompress => {
            let input = ReadWindow::map(src, None)?;
            let known = if codec.knows_uncompressed_size() {
                ops.uncompressed_size(input.data())
            } else {
                None
            };

            if let Some(size) = known {
                let mut output = WriteWindow::map(dst, size)?;
                match ops.decompress_buffer(output.data(), input.data(), options)? {
                    BufferResult::Complete(written) => {
                        let publish = budget_clamp(written, length);
                        input.commit()?;
                        output.commit(publish as u64)?;
                        Ok(())
                    }
                    BufferResult::BufferFull => Err(Error::InvalidBuffer),
                }
            } else {
                let mut capacity = seed_output_size(input.len());
                loop {
                    if capacity > OUTPUT_SANITY_CAP {
                        return Err(Error::InvalidBuffer);
                    }
                    let mut output = WriteWindow::map(dst, capacity as u64)?;
                    match ops.decompress_buffer(output.data(), input.data(), options)? {
                        BufferResult::Complete(written) => {
                            let publish = budget_clamp(written, length);
                            input.commit()?;
                            output.commit(publish as u64)?;
                            return Ok(());
                        }
                        BufferResult::BufferFull => {
                            trace!(capacity, "growing mapped decompression window");
                            capacity <<= 1;
                        }
                    }
                }
            }
        }
    }
}

fn budget_clamp(written: usize, length: u64) -> usize {
    if length == 0 {
        written
    } else {
        written.min(usize::try_from(length).unwrap_or(usize::MAX))
    }
}

/// Per-block mapped variant of the stream loop.
fn splice_stream_mapped(
    codec: &Codec,
    direction: Direction,
    dst: &File,
    src: &File,
    length: u64,
    options: &Options,
) -> Result<MappedOutcome> {
    trace!(codec = codec.name(), ?direction, length, "mapped stream path");
    match direction {
        Direction::Compress => splice_stream_mapped_input(codec, dst, src, length, options),
        Direction::Decompress => splice_stream_mapped_output(codec, dst, src, length, options),
    }
}

/// Compression: map input blocks, write encoded output through the handle.
fn splice_stream_mapped_input(
    codec: &Codec,
    dst: &File,
    src: &File,
    length: u64,
    options: &Options,
) -> Result<MappedOutcome> {
    let mut stream = Stream::new(codec, Direction::Compress, options)?;
    let mut out_buf = try_vec(splice_buf_size())?;
    let mut sink = dst;

    let mut remaining = length;
    let mut first_block = true;

    loop {
        if length != 0 && remaining == 0 {
            break;
        }
        let req = if length == 0 {
            FILE_BLOCK_SIZE
        } else {
            remaining.min(FILE_BLOCK_SIZE)
        };
        let available = src
            .metadata()?
            .len()
            .saturating_sub(mmap::stream_position(src)?);
        let take = req.min(available);
        if take == 0 {
            if first_block {
                return Ok(MappedOutcome::Unmappable);
            }
            break;
        }

        let window = match ReadWindow::map(src, Some(take)) {
            Ok(window) => window,
            Err(err) => {
                if first_block {
                    debug!(error = %err, "first input block unmappable, using buffered loop");
                    return Ok(MappedOutcome::Unmappable);
                }
                debug!(error = %err, "input block mapping failed mid-stream, finishing");
                break;
            }
        };
        first_block = false;

        let data = window.data();
        let mut fed = 0;
        loop {
            let progress = stream.process(&data[fed..], &mut out_buf)?;
            fed += progress.consumed;
            sink.write_all(&out_buf[..progress.produced])
                .map_err(Error::Io)?;
            match progress.status {
                StreamStatus::Processing => {}
                _ if fed < data.len() => {}
                _ => break,
            }
        }

        window.commit()?;
        if length != 0 {
            remaining -= take;
        }
    }

    // Flush the trailer.
    loop {
        let progress = stream.finish(&[], &mut out_buf)?;
        sink.write_all(&out_buf[..progress.produced])
            .map_err(Error::Io)?;
        if progress.status != StreamStatus::Processing {
            break;
        }
    }

    Ok(MappedOutcome::Done)
}

/// Decompression: map output blocks, read encoded input through the handle.
fn splice_stream_mapped_output(
    codec: &Codec,
    dst: &File,
    src: &File,
    length: u64,
    options: &Options,
) -> Result<MappedOutcome> {
    let mut stream = Stream::new(codec, Direction::Decompress, options)?;
    let mut in_buf = try_vec(splice_buf_size())?;
    let mut source = src;

    let mut filled = 0;
    let mut pos = 0;
    let mut eof = false;
    let mut remaining = length;
    let mut first_block = true;

    loop {
        if length != 0 && remaining == 0 {
            break;
        }
        let req = if length == 0 {
            FILE_BLOCK_SIZE
        } else {
            remaining.min(FILE_BLOCK_SIZE)
        };

        let mut window = match WriteWindow::map(dst, req) {
            Ok(window) => window,
            Err(err) => {
                if first_block {
                    debug!(error = %err, "first output block unmappable, using buffered loop");
                    return Ok(MappedOutcome::Unmappable);
                }
                debug!(error = %err, "output block mapping failed mid-stream, stopping");
                break;
            }
        };
        first_block = false;

        let mut written = 0;
        while written < window.capacity() {
            if pos == filled && !eof {
                match source.read(&mut in_buf) {
                    Ok(0) => eof = true,
                    Ok(read) => {
                        filled = read;
                        pos = 0;
                    }
                    Err(err) => return Err(Error::Io(err)),
                }
            }

            let out_slice = &mut window.data()[written..];
            let progress = if eof {
                stream.finish(&in_buf[pos..filled], out_slice)?
            } else {
                stream.process(&in_buf[pos..filled], out_slice)?
            };
            pos += progress.consumed;
            written += progress.produced;

            match progress.status {
                StreamStatus::EndOfStream => {
                    window.commit(written as u64)?;
                    return Ok(MappedOutcome::Done);
                }
                StreamStatus::Ok if eof && pos == filled => {
                    window.commit(written as u64)?;
                    return Ok(MappedOutcome::Done);
                }
                _ => {}
            }
        }

        window.commit(written as u64)?;
        if length != 0 {
            remaining -= written as u64;
        }
    }

    Ok(MappedOutcome::Done)
}
