//! Name-to-descriptor codec lookup.

use std::collections::BTreeMap;
use std::fs::File;
use std::sync::Arc;

use crate::codec::{Codec, Direction};
use crate::error::{Error, Result};
use crate::file::splice_codec_with_options;
use crate::options::Options;

/// Registry of codec descriptors, keyed by their unique names.
///
/// The registry is plain data: populate it once at startup (back-end crates
/// provide helpers for their codecs) and share it behind an `Arc` or a
/// `static`. Lookups hand out shared descriptors, so concurrent splices on
/// disjoint streams need no further coordination.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    codecs: BTreeMap<String, Arc<Codec>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateCodec`] when a codec with the same name is
    /// already present.
    pub fn register(&mut self, codec: Codec) -> Result<()> {
        let name = codec.name().to_string();
        if self.codecs.contains_key(&name) {
            return Err(Error::DuplicateCodec(name));
        }
        self.codecs.insert(name, Arc::new(codec));
        Ok(())
    }

    /// Looks up a codec by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Codec>> {
        self.codecs.get(name).cloned()
    }

    /// Looks up a codec by name, failing with [`Error::UnknownCodec`].
    pub fn require(&self, name: &str) -> Result<Arc<Codec>> {
        self.get(name)
            .ok_or_else(|| Error::UnknownCodec(name.to_string()))
    }

    /// Iterates over the registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }

    /// Number of registered codecs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Splices between two files through the named codec with default
    /// options.
    ///
    /// See [`splice_codec_with_options`](crate::file::splice_codec_with_options)
    /// for the full contract.
    pub fn splice(
        &self,
        name: &str,
        direction: Direction,
        dst: &mut File,
        src: &mut File,
        length: u64,
    ) -> Result<()> {
        self.splice_with_options(name, direction, dst, src, length, None)
    }

    /// Splices between two files through the named codec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCodec`] when `name` is not registered, plus
    /// everything the underlying splice can report.
    pub fn splice_with_options(
        &self,
        name: &str,
        direction: Direction,
        dst: &mut File,
        src: &mut File,
        length: u64,
        options: Option<&Options>,
    ) -> Result<()> {
        let codec = self.require(name)?;
        splice_codec_with_options(&codec, direction, dst, src, length, options)
    }
}
