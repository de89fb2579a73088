#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Bundled codec back-ends for the `squash-core` splice engine, one module
//! per format, each exposing a `codec()` constructor for its descriptor.
//! The back-ends deliberately span every capability tier the engine
//! dispatches over:
//!
//! | codec    | tiers            | knows uncompressed size |
//! |----------|------------------|-------------------------|
//! | `snappy` | buffer           | yes                     |
//! | `zstd`   | buffer + stream  | yes (bulk frames)       |
//! | `zlib`   | buffer + stream  | no                      |
//! | `lz4`    | buffer           | no                      |
//! | `copy`   | buffer + splice  | yes                     |
//!
//! # Examples
//!
//! ```
//! use squash_codecs::default_registry;
//! use squash_core::{splice_custom_codec_with_options, Direction};
//!
//! # fn main() -> squash_core::Result<()> {
//! let codec = default_registry().require("zstd")?;
//!
//! let payload = b"the quick brown fox jumps over the lazy dog";
//! let mut compressed = Vec::new();
//! splice_custom_codec_with_options(
//!     &codec,
//!     Direction::Compress,
//!     &mut compressed,
//!     &mut &payload[..],
//!     0,
//!     None,
//! )?;
//!
//! let mut restored = Vec::new();
//! splice_custom_codec_with_options(
//!     &codec,
//!     Direction::Decompress,
//!     &mut restored,
//!     &mut &compressed[..],
//!     0,
//!     None,
//! )?;
//! assert_eq!(restored, payload);
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use squash_core::{Registry, Result};

pub mod copy;
pub mod lz4;
pub mod snappy;
pub mod zlib;
pub mod zstd;

/// Registers every bundled codec into `registry`.
///
/// # Errors
///
/// Returns [`squash_core::Error::DuplicateCodec`] when one of the bundled
/// names is already taken.
pub fn register_defaults(registry: &mut Registry) -> Result<()> {
    registry.register(copy::codec()?)?;
    registry.register(lz4::codec()?)?;
    registry.register(snappy::codec()?)?;
    registry.register(zlib::codec()?)?;
    registry.register(zstd::codec()?)?;
    Ok(())
}

/// Process-wide registry holding the bundled codecs, built on first use.
pub fn default_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();

    REGISTRY.get_or_init(|| {
        let mut registry = Registry::new();
        register_defaults(&mut registry).expect("bundled codecs have distinct names");
        registry
    })
}
