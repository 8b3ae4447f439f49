//! Block device abstraction.
//!
//! A [`DiskManager`] stores fixed-size pages addressed by page id. Both
//! operations are synchronous from the caller's perspective; the buffer
//! pool routes them through the [`DiskScheduler`](super::DiskScheduler)
//! worker rather than calling them directly.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use corvus_common::types::PageId;
use parking_lot::Mutex;
use thiserror::Error;

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur during block device operations.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The target page id is the reserved sentinel.
    #[error("invalid page ID: {page_id}")]
    InvalidPageId {
        /// The offending page id.
        page_id: PageId,
    },

    /// The supplied buffer does not match the device page size.
    #[error("buffer length {actual} does not match page size {expected}")]
    BufferSize {
        /// Expected page size in bytes.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// I/O error from the underlying device.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },
}

/// Abstraction over a block device that stores fixed-size pages.
///
/// Pages that were never written read back as all zeroes.
pub trait DiskManager: Send + Sync {
    /// Fills `buf` with the contents of the page.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()>;

    /// Durably stores `data` as the contents of the page.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()>;

    /// Returns the fixed page size in bytes.
    fn page_size(&self) -> usize;
}

/// File-backed disk manager.
///
/// Pages live at offset `page_id * page_size` in a single data file.
/// Reads past the end of the file zero-fill the remainder of the buffer;
/// writes extend the file as needed.
pub struct FileDiskManager {
    file: Mutex<File>,
    path: PathBuf,
    page_size: usize,
}

impl FileDiskManager {
    /// Opens (creating if absent) the data file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
        })
    }

    /// Returns the path of the backing data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_request(&self, page_id: PageId, len: usize) -> DiskResult<u64> {
        if !page_id.is_valid() {
            return Err(DiskError::InvalidPageId { page_id });
        }
        if len != self.page_size {
            return Err(DiskError::BufferSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(page_id.as_u64() * self.page_size as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        let offset = self.check_request(page_id, buf.len())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        // Short read means the page was never written; the rest is zeroes.
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        let offset = self.check_request(page_id, data.len())?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// In-memory disk manager for tests.
///
/// Keeps pages in a hash map and counts reads and writes so tests can
/// assert on I/O traffic.
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Vec<u8>>>,
    page_size: usize,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory device.
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            page_size,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of pages that have ever been written.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    /// Total reads served.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total writes served.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::InvalidPageId { page_id });
        }
        if buf.len() != self.page_size {
            return Err(DiskError::BufferSize {
                expected: self.page_size,
                actual: buf.len(),
            });
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::InvalidPageId { page_id });
        }
        if data.len() != self.page_size {
            return Err(DiskError::BufferSize {
                expected: self.page_size,
                actual: data.len(),
            });
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.pages.lock().insert(page_id, data.to_vec());
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("page_size", &self.page_size)
            .field("pages", &self.page_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 512;

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let data = vec![0xABu8; PAGE_SIZE];
        disk.write_page(PageId::new(3), &data).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(3), &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_file_unwritten_page_reads_zeroes() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        disk.read_page(PageId::new(9), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_partial_tail_zero_filled() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        // Page 0 is written, page 1 is not; reading page 1 after page 0
        // exists must still produce zeroes.
        disk.write_page(PageId::new(0), &vec![1u8; PAGE_SIZE]).unwrap();
        let mut buf = vec![0xFFu8; PAGE_SIZE];
        disk.read_page(PageId::new(1), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_rejects_invalid_page_id() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        let result = disk.read_page(PageId::INVALID, &mut buf);
        assert!(matches!(result, Err(DiskError::InvalidPageId { .. })));
    }

    #[test]
    fn test_file_rejects_wrong_buffer_size() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE / 2];
        let result = disk.read_page(PageId::new(0), &mut buf);
        assert!(matches!(result, Err(DiskError::BufferSize { .. })));
    }

    #[test]
    fn test_memory_round_trip_and_counters() {
        let disk = MemoryDiskManager::new(PAGE_SIZE);

        let data = vec![7u8; PAGE_SIZE];
        disk.write_page(PageId::new(0), &data).unwrap();
        assert_eq!(disk.write_count(), 1);
        assert_eq!(disk.page_count(), 1);

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        assert_eq!(buf, data);
        assert_eq!(disk.read_count(), 1);
    }

    #[test]
    fn test_memory_unwritten_page_reads_zeroes() {
        let disk = MemoryDiskManager::new(PAGE_SIZE);
        let mut buf = vec![0xAAu8; PAGE_SIZE];
        disk.read_page(PageId::new(42), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }
}
