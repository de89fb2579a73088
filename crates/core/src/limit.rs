//! Byte-budget enforcement for splice transfers.
//!
//! When a caller supplies a non-zero `length`, exactly one side of the
//! transfer is bounded on its *uncompressed* bytes: the read side when
//! compressing, the write side when decompressing. The wrappers here sit in
//! front of the caller's endpoints and clamp every request against the
//! remaining budget; the unlimited side passes through verbatim.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Marker carried inside the [`io::Error`] raised by [`LimitedWriter`] once
/// its budget is exhausted and a codec keeps producing output.
///
/// The splice dispatcher treats this marker as a clean stop rather than a
/// failure, which is what lets decompression budgets silently truncate
/// excess codec output.
#[derive(Debug, Error)]
#[error("write budget exhausted")]
pub(crate) struct BudgetExhausted;

/// Returns true when `err` is the budget-exhausted stop signal.
pub(crate) fn is_budget_exhausted(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<BudgetExhausted>())
}

pub(crate) fn budget_exhausted_error() -> io::Error {
    io::Error::new(io::ErrorKind::WriteZero, BudgetExhausted)
}

/// Reader that reports end-of-stream after a fixed number of bytes.
///
/// Used on the input side of budgeted compression: requests are clamped to
/// the remaining budget and, once it reaches zero, every read returns
/// `Ok(0)` regardless of how much input the underlying reader still holds.
#[derive(Debug)]
pub struct LimitedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R> LimitedReader<R> {
    /// Wraps `inner`, allowing at most `budget` bytes to be read.
    pub fn new(inner: R, budget: u64) -> Self {
        Self {
            inner,
            remaining: budget,
        }
    }

    /// Bytes left before the reader reports end-of-stream.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let read = self.inner.read(&mut buf[..max])?;
        self.remaining -= read as u64;
        Ok(read)
    }
}

/// Writer that forwards at most a fixed number of bytes.
///
/// Used on the output side of budgeted decompression. Writes are clamped to
/// the remaining budget; once it reaches zero, the next non-empty write
/// raises the budget-exhausted stop signal so the producing codec unwinds
/// instead of generating output that would be discarded.
#[derive(Debug)]
pub struct LimitedWriter<W> {
    inner: W,
    remaining: u64,
    written: u64,
}

impl<W> LimitedWriter<W> {
    /// Wraps `inner`, forwarding at most `budget` bytes.
    pub fn new(inner: W, budget: u64) -> Self {
        Self {
            inner,
            remaining: budget,
            written: 0,
        }
    }

    /// Bytes actually forwarded to the underlying writer.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for LimitedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            return Err(budget_exhausted_error());
        }

        let max = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let written = self.inner.write(&buf[..max])?;
        self.remaining -= written as u64;
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
