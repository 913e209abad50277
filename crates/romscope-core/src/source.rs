//! Random-access byte sources
//!
//! A [`ByteSource`] is a fixed-length, read-only view over a file or a memory
//! region. Every read is checked against the *declared* length of the source,
//! never against the size of whatever storage backs it: a truncated download
//! still reports its full declared length, and reads into the missing tail fail
//! with [`Error::Truncated`] instead of returning short data.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Check that `offset..offset + length` lies within `size`
pub fn check_range(offset: u64, length: u64, size: u64) -> Result<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfRange { offset, length, size }),
    }
}

/// Read-only, random-access view over a fixed number of bytes
pub trait ByteSource: Send + Sync {
    /// Declared length in bytes. Fixed for the lifetime of the source.
    fn len(&self) -> u64;

    /// Whether the source is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with [`Error::OutOfRange`] if the range passes the declared length.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read `length` bytes starting at `offset`
    fn read(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        // Range is validated before the buffer is allocated.
        check_range(offset, length as u64, self.len())?;
        let mut buf = vec![0u8; length];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read up to `max` bytes from the start of the source
    fn read_prefix(&self, max: usize) -> Result<Vec<u8>> {
        let length = self.len().min(max as u64) as usize;
        self.read(0, length)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Arc<S> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }
}

/// In-memory byte source
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Vec<u8>,
    declared: u64,
}

impl MemorySource {
    /// Create a source whose declared length is the buffer length
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let declared = data.len() as u64;
        Self { data, declared }
    }

    /// Create a source that declares more bytes than it actually holds
    pub fn with_declared_len(data: impl Into<Vec<u8>>, declared: u64) -> Self {
        Self {
            data: data.into(),
            declared,
        }
    }

    /// Bytes actually held in memory
    pub fn stored(&self) -> &[u8] {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.declared
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len() as u64, self.declared)?;

        let stored = self.data.len() as u64;
        let end = offset + buf.len() as u64;
        if end > stored {
            return Err(Error::Truncated {
                offset: stored,
                declared: self.declared,
            });
        }

        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }
}

/// File-backed byte source using positioned reads
pub struct FileSource {
    file: Mutex<File>,
    declared: u64,
}

impl FileSource {
    /// Open a file; the declared length is the file size at open time
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(file)
    }

    /// Wrap an already opened file
    pub fn from_file(file: File) -> Result<Self> {
        let declared = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            declared,
        })
    }

    /// Wrap a file with an explicit declared length (e.g. a partial download)
    pub fn with_declared_len(file: File, declared: u64) -> Self {
        Self {
            file: Mutex::new(file),
            declared,
        }
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.declared
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len() as u64, self.declared)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        match file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                let stored = file.metadata().map(|m| m.len()).unwrap_or(offset);
                Err(Error::Truncated {
                    offset: stored,
                    declared: self.declared,
                })
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Memory-mapped byte source for large files
pub struct MmapSource {
    map: Mmap,
}

impl MmapSource {
    /// Map a file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the map is read-only and owned by this source; callers are
        // expected not to truncate the file while it is open.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len() as u64, self.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.map[start..start + buf.len()]);
        Ok(())
    }
}

/// Window over a range of another source
pub struct SubSource<S> {
    inner: S,
    base: u64,
    length: u64,
}

impl<S: ByteSource> SubSource<S> {
    /// Create a window of `length` bytes starting at `base` in `inner`
    pub fn new(inner: S, base: u64, length: u64) -> Result<Self> {
        check_range(base, length, inner.len())?;
        Ok(Self { inner, base, length })
    }

    /// Offset of this window within the parent source
    pub fn base(&self) -> u64 {
        self.base
    }
}

impl<S: ByteSource> ByteSource for SubSource<S> {
    fn len(&self) -> u64 {
        self.length
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_range(offset, buf.len() as u64, self.length)?;
        self.inner.read_at(self.base + offset, buf)
    }
}

/// Open a file, memory mapping it when it is at least `mmap_threshold` bytes
pub fn open_path(path: impl AsRef<Path>, mmap_threshold: Option<u64>) -> Result<Box<dyn ByteSource>> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)?.len();

    if let Some(threshold) = mmap_threshold {
        if size >= threshold && size > 0 {
            tracing::debug!(path = %path.display(), size, "Opening memory-mapped source");
            return Ok(Box::new(MmapSource::open(path)?));
        }
    }

    tracing::debug!(path = %path.display(), size, "Opening file source");
    Ok(Box::new(FileSource::open(path)?))
}

/// Sequential `Read + Seek` adapter with a current position over a [`ByteSource`]
pub struct SourceCursor<'a, S: ?Sized> {
    source: &'a S,
    pos: u64,
}

impl<'a, S: ByteSource + ?Sized> SourceCursor<'a, S> {
    /// Create a cursor positioned at the start of the source
    pub fn new(source: &'a S) -> Self {
        Self { source, pos: 0 }
    }

    /// Create a cursor at `pos`
    pub fn at(source: &'a S, pos: u64) -> Self {
        Self { source, pos }
    }

    /// Current position
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the declared end
    pub fn remaining(&self) -> u64 {
        self.source.len().saturating_sub(self.pos)
    }
}

impl<S: ByteSource + ?Sized> Read for SourceCursor<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = (buf.len() as u64).min(self.remaining()) as usize;
        if to_read == 0 {
            return Ok(0);
        }

        self.source
            .read_at(self.pos, &mut buf[..to_read])
            .map_err(|e| match e {
                Error::Io(io) => io,
                other => io::Error::new(io::ErrorKind::UnexpectedEof, other.to_string()),
            })?;
        self.pos += to_read as u64;
        Ok(to_read)
    }
}

impl<S: ByteSource + ?Sized> Seek for SourceCursor<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(delta) => self.source.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        match new_pos {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}
