//! Growable scratch storage for the one-shot fallback path.

use crate::error::{Error, Result};

/// Allocates a zero-filled `Vec` of `len` bytes, reporting allocation
/// failure as [`Error::Memory`] instead of aborting.
pub(crate) fn try_vec(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::Memory(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Expandable byte accumulator.
///
/// Capacity only ever grows: [`Accumulator::set_size`] extends the readable
/// length (allocating as needed) while [`Accumulator::truncate`] shrinks the
/// length without releasing storage, so repeated drain cycles reuse the same
/// allocation.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    data: Vec<u8>,
}

impl Accumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Grows the readable length to exactly `len` bytes, zero-filling any
    /// newly exposed tail.
    pub(crate) fn set_size(&mut self, len: usize) -> Result<()> {
        if len > self.data.len() {
            let extra = len - self.data.len();
            self.data.try_reserve(extra).map_err(|_| Error::Memory(len))?;
        }
        self.data.resize(len, 0);
        Ok(())
    }

    /// Shrinks the readable length; storage is retained.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
