//! Random-access byte sources.
//!
//! The decoder addresses its input by absolute byte index. [`ByteSource`] is
//! the seam between the bit-level reader and the actual storage:
//! [`ChunkedReader`] serves a file through an in-memory sliding window while
//! [`MemoryReader`] serves a byte slice directly (mostly for tests).
//!
//! # Examples
//!
//! ```
//! use clim_core::io::byteio::{ByteSource, MemoryReader};
//!
//! # use clim_core::io::byteio::ByteIOResult;
//! # fn foo() -> ByteIOResult<u8> {
//! let data: [u8; 4] = [42, 43, 44, 45];
//! let mut src = MemoryReader::new(&data);
//! let value = src.byte_at(2)?; // 44
//! # Ok(value)
//! # }
//! ```

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Default window size for [`ChunkedReader`].
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 16;
/// Default backward overlap for [`ChunkedReader`] window reloads.
pub const DEFAULT_OVERLAP_SIZE: usize = 1 << 8;

/// A list specifying byte source errors.
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum ByteIOError {
    /// The requested index lies past the end of the source.
    OutOfRange,
    /// Opening or reading the underlying file failed.
    ReadError,
}

/// A specialised `Result` type for byte source operations.
pub type ByteIOResult<T> = Result<T, ByteIOError>;

/// Random access to a bounded sequence of bytes.
pub trait ByteSource {
    /// Returns the byte at the given absolute index.
    fn byte_at(&mut self, index: u64) -> ByteIOResult<u8>;
    /// Returns the total size of the source in bytes.
    fn size(&self) -> u64;
}

/// Byte source backed by a slice held in memory.
pub struct MemoryReader<'a> {
    buf: &'a [u8],
}

impl<'a> MemoryReader<'a> {
    /// Constructs a new `MemoryReader` over the provided slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> ByteSource for MemoryReader<'a> {
    fn byte_at(&mut self, index: u64) -> ByteIOResult<u8> {
        if index >= self.buf.len() as u64 { return Err(ByteIOError::OutOfRange); }
        Ok(self.buf[index as usize])
    }
    fn size(&self) -> u64 { self.buf.len() as u64 }
}

/// Byte source reading a file through a sliding window.
///
/// A window of at most `chunk_size` bytes is kept in memory. A request
/// outside the window reloads it starting `overlap_size` bytes before the
/// requested index, so mostly-sequential access with small backward steps
/// (the access pattern of a bit reader re-reading its current byte) costs
/// one file read per `chunk_size` bytes consumed.
#[derive(Debug)]
pub struct ChunkedReader {
    file:         File,
    file_size:    u64,
    chunk_size:   usize,
    overlap_size: usize,
    window:       Vec<u8>,
    window_start: u64,
}

impl ChunkedReader {
    /// Opens `path` with the given window geometry.
    ///
    /// `chunk_size` is clamped to at least one byte.
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize, overlap_size: usize) -> ByteIOResult<Self> {
        let file = File::open(path).map_err(|_| ByteIOError::ReadError)?;
        let file_size = file.metadata().map_err(|_| ByteIOError::ReadError)?.len();
        Ok(Self {
            file,
            file_size,
            chunk_size: chunk_size.max(1),
            overlap_size,
            window: Vec::new(),
            window_start: 0,
        })
    }

    /// Opens `path` with the default window geometry
    /// ([`DEFAULT_CHUNK_SIZE`] / [`DEFAULT_OVERLAP_SIZE`]).
    pub fn open_default<P: AsRef<Path>>(path: P) -> ByteIOResult<Self> {
        Self::open(path, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP_SIZE)
    }

    fn load_window(&mut self, start: u64) -> ByteIOResult<()> {
        if start >= self.file_size { return Err(ByteIOError::OutOfRange); }
        let len = std::cmp::min(self.chunk_size as u64, self.file_size - start) as usize;
        self.window.resize(len, 0);
        self.file.seek(SeekFrom::Start(start)).map_err(|_| ByteIOError::ReadError)?;
        self.file.read_exact(&mut self.window).map_err(|_| ByteIOError::ReadError)?;
        self.window_start = start;
        Ok(())
    }
}

impl ByteSource for ChunkedReader {
    fn byte_at(&mut self, index: u64) -> ByteIOResult<u8> {
        if index >= self.file_size { return Err(ByteIOError::OutOfRange); }
        let in_window = index >= self.window_start
                     && index < self.window_start + self.window.len() as u64;
        if !in_window {
            self.load_window(index.saturating_sub(self.overlap_size as u64))?;
        }
        Ok(self.window[(index - self.window_start) as usize])
    }
    fn size(&self) -> u64 { self.file_size }
}
