#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `squash-core` is a unified front-end for byte-oriented compression
//! codecs: one API through which callers compress or decompress data with
//! any registered back-end, without knowing each back-end's calling
//! convention, buffer sizing rules, or streaming state machine.
//!
//! The heart of the crate is the *splice engine*, which moves bytes between
//! two endpoints through an arbitrary codec. Back-ends advertise up to
//! three capability tiers — one-shot buffer transforms, an incremental
//! stream processor, and a native splice callback — and the engine selects
//! the best available path at run time, together with one of two I/O
//! strategies for file endpoints (memory-mapped windows or buffered
//! read/write, steered by the `SQUASH_MAP_SPLICE` environment variable).
//!
//! # Design
//!
//! - [`codec`] defines the [`Codec`] descriptor and the capability traits
//!   back-ends implement; [`registry`] maps names to descriptors.
//! - [`splice`] owns dispatch over generic [`std::io::Read`] /
//!   [`std::io::Write`] endpoints; [`file`] adds file locking and the
//!   memory-mapped strategies, and [`Registry`] exposes the by-name entry
//!   points.
//! - [`options`] carries the per-codec configuration bundle, built once by
//!   the caller and borrowed by every splice.
//!
//! # Invariants
//!
//! - A successful splice has transferred exactly the requested number of
//!   uncompressed bytes (or everything, when `length = 0`), and the sink
//!   holds a complete, valid stream.
//! - Undersized output buffers are handled internally by regrowing and
//!   retrying; they are never surfaced to callers.
//! - Per-call resources — scratch buffers, mapped windows, stream state,
//!   file locks — are released on every exit path.
//!
//! # Examples
//!
//! Splicing through a custom passthrough codec between in-memory endpoints:
//!
//! ```
//! use squash_core::{
//!     splice_custom_codec_with_options, BufferCodec, BufferResult, Codec, Direction, Options,
//! };
//!
//! struct Passthrough;
//!
//! impl BufferCodec for Passthrough {
//!     fn max_compressed_size(&self, uncompressed_len: usize) -> usize {
//!         uncompressed_len
//!     }
//!
//!     fn compress_buffer(
//!         &self,
//!         output: &mut [u8],
//!         input: &[u8],
//!         _options: &Options,
//!     ) -> squash_core::Result<BufferResult> {
//!         if output.len() < input.len() {
//!             return Ok(BufferResult::BufferFull);
//!         }
//!         output[..input.len()].copy_from_slice(input);
//!         Ok(BufferResult::Complete(input.len()))
//!     }
//!
//!     fn decompress_buffer(
//!         &self,
//!         output: &mut [u8],
//!         input: &[u8],
//!         options: &Options,
//!     ) -> squash_core::Result<BufferResult> {
//!         self.compress_buffer(output, input, options)
//!     }
//! }
//!
//! # fn main() -> squash_core::Result<()> {
//! let codec = Codec::builder("passthrough").buffer(Passthrough).build()?;
//! let mut source = &b"payload"[..];
//! let mut sink = Vec::new();
//! splice_custom_codec_with_options(&codec, Direction::Compress, &mut sink, &mut source, 0, None)?;
//! assert_eq!(sink, b"payload");
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - `squash-codecs` for the bundled back-ends and the default registry.
//! - `squash-cli` for the command-line front-end.

mod buffer;
pub mod codec;
pub mod error;
pub mod file;
pub mod limit;
pub mod mmap;
pub mod options;
pub mod registry;
pub mod splice;
pub mod stream;

pub use codec::{
    BufferCodec, BufferResult, Codec, CodecBuilder, CodecStream, Direction, SpliceCodec,
    StreamCodec, StreamProgress, StreamStatus,
};
pub use error::{Error, Result};
pub use file::{splice_codec, splice_codec_with_options};
pub use limit::{LimitedReader, LimitedWriter};
pub use mmap::{ReadWindow, WriteWindow};
pub use options::{CompressionLevel, CompressionLevelError, Options, OptionsBuilder};
pub use registry::Registry;
pub use splice::splice_custom_codec_with_options;
pub use stream::Stream;
