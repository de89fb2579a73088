//! Typed per-codec configuration.
//!
//! An [`Options`] bundle is produced once by the caller (usually through
//! [`OptionsBuilder`]) and borrowed by every splice call that uses it. The
//! bundle itself is codec-agnostic: it carries a compression level plus a
//! string key/value map for back-end specific knobs, and each codec
//! interprets only the entries it understands.

use std::collections::BTreeMap;
use std::num::NonZeroU8;

use thiserror::Error;

/// Compression levels recognised across the codec back-ends.
///
/// The named variants map onto whatever the selected codec considers fast,
/// default, and best; [`CompressionLevel::Precise`] passes a numeric level
/// through unchanged, clamped by the back-end to its own supported range.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionLevel {
    /// Favour speed over compression ratio.
    Fast,
    /// Use the codec's default balance between speed and ratio.
    Default,
    /// Favour the best possible compression ratio.
    Best,
    /// Use an explicit numeric level.
    Precise(NonZeroU8),
}

impl CompressionLevel {
    /// Creates a [`CompressionLevel::Precise`] value from an explicit numeric level.
    ///
    /// # Errors
    ///
    /// Returns [`CompressionLevelError`] when `level` falls outside the
    /// inclusive range `1..=22` spanned by the supported back-ends.
    pub fn from_numeric(level: u32) -> Result<Self, CompressionLevelError> {
        if !(1..=22).contains(&level) {
            return Err(CompressionLevelError::new(level));
        }

        let as_u8 = u8::try_from(level).map_err(|_| CompressionLevelError::new(level))?;
        let precise = NonZeroU8::new(as_u8).ok_or_else(|| CompressionLevelError::new(level))?;
        Ok(Self::Precise(precise))
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::Default
    }
}

/// Error returned when a requested compression level falls outside the
/// permissible range.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("compression level {level} is outside the supported range 1-22")]
pub struct CompressionLevelError {
    level: u32,
}

impl CompressionLevelError {
    const fn new(level: u32) -> Self {
        Self { level }
    }

    /// Returns the invalid compression level that triggered the error.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }
}

/// Opaque per-codec configuration bundle.
///
/// Owned by the caller, borrowed by splice calls. Construct with
/// [`Options::builder`]; the default bundle leaves every knob at the codec's
/// own default.
#[derive(Clone, Debug, Default)]
pub struct Options {
    level: Option<CompressionLevel>,
    params: BTreeMap<String, String>,
}

impl Options {
    /// Starts building an options bundle.
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Returns the requested compression level, if any.
    #[must_use]
    pub fn level(&self) -> Option<CompressionLevel> {
        self.level
    }

    /// Looks up a codec-specific parameter by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Builder for [`Options`].
///
/// Replaces the NULL-sentinel varargs of older C front-ends with an explicit,
/// type-checked construction step.
#[derive(Clone, Debug, Default)]
pub struct OptionsBuilder {
    level: Option<CompressionLevel>,
    params: BTreeMap<String, String>,
}

impl OptionsBuilder {
    /// Sets the compression level.
    #[must_use]
    pub fn level(mut self, level: CompressionLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets a codec-specific string parameter.
    ///
    /// Unknown keys are ignored by back-ends that do not understand them.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Finishes the bundle.
    #[must_use]
    pub fn build(self) -> Options {
        Options {
            level: self.level,
            params: self.params,
        }
    }
}
