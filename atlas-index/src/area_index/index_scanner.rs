//! Binary reader primitive over the index file.
//!
//! The loader consumes the file through two small pieces:
//! - [`IndexFile`]: a read-only memory map of the whole file, alive only
//!   for the duration of the load (the decoded structure owns its data).
//! - [`Scanner`]: a little-endian, position-tracking cursor over the mapped
//!   bytes. The current position is what keys entry records, so the cursor
//!   is the single source of truth for "where am I in the file".
//!
//! A read past the end of the data surfaces as an `UnexpectedEof` I/O
//! error, which is how truncated files fail the load.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::index_types::{FileOffset, IndexResult};

/// Read-only mapping of an index file.
#[derive(Debug)]
pub struct IndexFile {
    mmap: Mmap,
    path: PathBuf,
}

impl IndexFile {
    /// Opens and maps the file at `path`.
    pub fn open(path: &Path) -> IndexResult<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and private to this process for
        // the duration of the load; the builder never rewrites a published
        // index file in place.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// The mapped bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// The path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Little-endian cursor over a byte slice.
pub struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute position, which is also the key of a record that
    /// starts here.
    pub fn position(&self) -> FileOffset {
        self.pos as FileOffset
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> IndexResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "short read at offset {}: wanted {} bytes, {} left",
                    self.pos,
                    len,
                    self.remaining()
                ),
            )
            .into());
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u16(&mut self) -> IndexResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> IndexResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> IndexResult<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_f64(&mut self) -> IndexResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area_index::IndexError;

    #[test]
    fn test_scanner_sequential_reads() {
        let mut data = Vec::new();
        data.extend_from_slice(&0xBEEFu16.to_le_bytes());
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        data.extend_from_slice(&2.5f64.to_bits().to_le_bytes());

        let mut scanner = Scanner::new(&data);
        assert_eq!(scanner.position(), 0);
        assert_eq!(scanner.read_u16().unwrap(), 0xBEEF);
        assert_eq!(scanner.read_u32().unwrap(), 7);
        assert_eq!(scanner.position(), 6);
        assert_eq!(scanner.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(scanner.read_f64().unwrap(), 2.5);
        assert_eq!(scanner.remaining(), 0);
    }

    #[test]
    fn test_scanner_short_read_is_io_error() {
        let data = [1u8, 2, 3];
        let mut scanner = Scanner::new(&data);
        let err = scanner.read_u32().unwrap_err();
        match err {
            IndexError::Io(io_err) => {
                assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected Io error, got {:?}", other),
        }
        // Position is untouched by a failed read
        assert_eq!(scanner.position(), 0);
    }

    #[test]
    fn test_index_file_open_missing() {
        let err = IndexFile::open(Path::new("/nonexistent/atlas.idx")).unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }

    #[test]
    fn test_index_file_maps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.idx");
        std::fs::write(&path, [9u8, 8, 7, 6]).unwrap();

        let file = IndexFile::open(&path).unwrap();
        assert_eq!(file.bytes(), &[9, 8, 7, 6]);
        assert_eq!(file.path(), path);
    }
}
