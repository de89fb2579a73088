//! Memory-mapped windows into file endpoints.
//!
//! A window covers the byte range starting at the file's current stream
//! position. Read windows are released by [`ReadWindow::commit`], which
//! advances the position past the consumed range. Write windows reserve
//! capacity up front and publish nothing until [`WriteWindow::commit`]
//! flushes the written prefix, trims the file to it, and advances the
//! position; dropping an uncommitted window restores the file to its
//! pre-window state.
//!
//! The underlying mapping library handles page alignment of arbitrary
//! offsets; the page size itself is still queried (once per process) because
//! the splice loops size their scratch buffers from it.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::sync::OnceLock;

use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::error::{Error, Result};

/// Smallest scratch buffer the splice loops will use.
const MIN_SPLICE_BUF_SIZE: usize = 512;

/// System page size, queried lazily and cached for the process lifetime.
///
/// Concurrent first calls are harmless: the query is deterministic, so every
/// racer caches the same value.
pub(crate) fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions and touches no caller memory.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if raw > 0 {
            raw as usize
        } else {
            8192
        }
    })
}

/// Scratch buffer size for the buffered splice loops: one page, but never
/// below [`MIN_SPLICE_BUF_SIZE`].
pub(crate) fn splice_buf_size() -> usize {
    page_size().max(MIN_SPLICE_BUF_SIZE)
}

pub(crate) fn stream_position(file: &File) -> io::Result<u64> {
    let mut handle = file;
    handle.stream_position()
}

fn seek_to(file: &File, pos: u64) -> io::Result<()> {
    let mut handle = file;
    handle.seek(SeekFrom::Start(pos))?;
    Ok(())
}

/// Read-only mapped window over `[position, position + len)` of a file.
#[derive(Debug)]
pub struct ReadWindow<'a> {
    file: &'a File,
    map: Option<Mmap>,
    pos: u64,
    len: usize,
}

impl<'a> ReadWindow<'a> {
    /// Maps `length` bytes at the file's current position, or everything up
    /// to end-of-file when `length` is `None`.
    ///
    /// # Errors
    ///
    /// Fails with an [`io::ErrorKind::UnexpectedEof`] error when an exact
    /// `length` exceeds the bytes remaining in the file, and with the
    /// underlying error when the mapping itself cannot be established.
    pub fn map(file: &'a File, length: Option<u64>) -> Result<Self> {
        let pos = stream_position(file)?;
        let available = file.metadata()?.len().saturating_sub(pos);
        let len = match length {
            None => available,
            Some(want) if want <= available => want,
            Some(want) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source holds {available} bytes but the splice needs {want}"),
                )));
            }
        };
        let len = usize::try_from(len).map_err(|_| Error::Memory(usize::MAX))?;

        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is never written through, and the engine
            // holds an exclusive advisory lock on the file for the duration
            // of the splice.
            Some(unsafe { MmapOptions::new().offset(pos).len(len).map(file)? })
        };

        Ok(Self {
            file,
            map,
            pos,
            len,
        })
    }

    /// The mapped bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Number of mapped bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the window is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Releases the window and advances the file position past it.
    pub fn commit(self) -> Result<()> {
        seek_to(self.file, self.pos + self.len as u64)?;
        Ok(())
    }
}

/// Writable mapped window appended at the file's current position.
pub struct WriteWindow<'a> {
    file: &'a File,
    map: Option<MmapMut>,
    capacity: usize,
    pos: u64,
    committed: bool,
}

impl<'a> WriteWindow<'a> {
    /// Reserves `capacity` writable bytes at the file's current position.
    ///
    /// The file is extended to cover the reservation immediately; nothing is
    /// considered published until [`WriteWindow::commit`].
    pub fn map(file: &'a File, capacity: u64) -> Result<Self> {
        let pos = stream_position(file)?;
        let capacity_bytes = usize::try_from(capacity).map_err(|_| Error::Memory(usize::MAX))?;
        file.set_len(pos + capacity)?;

        let map = if capacity_bytes == 0 {
            None
        } else {
            // SAFETY: the region was just reserved with set_len and the
            // engine holds an exclusive advisory lock on the file, so no
            // other mapping aliases it.
            let attempt = unsafe {
                MmapOptions::new()
                    .offset(pos)
                    .len(capacity_bytes)
                    .map_mut(file)
            };
            match attempt {
                Ok(map) => Some(map),
                Err(err) => {
                    // Give back the reservation so the caller's fallback
                    // path starts from a clean file.
                    let _ = file.set_len(pos);
                    return Err(Error::Io(err));
                }
            }
        };

        Ok(Self {
            file,
            map,
            capacity: capacity_bytes,
            pos,
            committed: false,
        })
    }

    /// The writable reservation.
    pub fn data(&mut self) -> &mut [u8] {
        match &mut self.map {
            Some(map) => map,
            None => &mut [],
        }
    }

    /// Size of the reservation.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publishes the first `length` bytes of the window.
    ///
    /// Flushes the mapping, trims the file to the published prefix, and
    /// advances the stream position past it.
    pub fn commit(mut self, length: u64) -> Result<()> {
        debug_assert!(length <= self.capacity as u64);
        if let Some(map) = self.map.take() {
            map.flush().map_err(Error::Io)?;
        }
        self.committed = true;
        self.file.set_len(self.pos + length)?;
        seek_to(self.file, self.pos + length)?;
        Ok(())
    }
}

impl Drop for WriteWindow<'_> {
    fn drop(&mut self) {
        if !self.committed {
            // Release without publication: unmap, then give back the
            // reservation so a retry (or the fallback path) starts clean.
            self.map = None;
            let _ = self.file.set_len(self.pos);
            let _ = seek_to(self.file, self.pos);
        }
    }
}
