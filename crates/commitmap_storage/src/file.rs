//! Buffered file backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Appends are held in memory until this many bytes accumulate.
const WRITE_BUFFER_LIMIT: usize = 64 * 1024;

/// A file-backed store with an append buffer.
///
/// Small appends (one enumerator record is a few dozen bytes) are collected
/// in memory and written out in batches. Reads that reach into the buffered
/// tail write it out first, so readers always see every appended byte.
///
/// # Durability
///
/// - `flush()` writes the buffer to the OS
/// - `sync()` additionally calls `File::sync_all()`
/// - dropping the backend writes out the buffer but does not fsync
///
/// # Example
///
/// ```no_run
/// use commitmap_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("hashes.3")).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<Inner>,
    read_only: bool,
}

#[derive(Debug)]
struct Inner {
    file: File,
    /// Bytes already handed to the file.
    written: u64,
    /// Appended bytes not yet written.
    pending: Vec<u8>,
}

impl Inner {
    fn size(&self) -> u64 {
        self.written + self.pending.len() as u64
    }

    fn write_out(&mut self) -> StorageResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.written))?;
        self.file.write_all(&self.pending)?;
        self.written += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }
}

impl FileBackend {
    /// Opens the file at `path`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::from_file(path, file, false)
    }

    /// Opens an existing file for reading only.
    ///
    /// Nothing is created, and `append` and `truncate` fail with
    /// [`StorageError::ReadOnly`], so the file is never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::from_file(path, file, true)
    }

    fn from_file(path: &Path, file: File, read_only: bool) -> StorageResult<Self> {
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                file,
                written,
                pending: Vec::new(),
            }),
            read_only,
        })
    }

    /// Like [`FileBackend::open`], creating missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file was opened with [`FileBackend::open_read_only`].
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of appended bytes not yet written to the file.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size();
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }
        if end > inner.written {
            inner.write_out()?;
        }

        let mut buf = vec![0u8; len];
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let inner = self.inner.get_mut();
        let offset = inner.size();
        let buffered = inner.pending.len();
        inner.pending.extend_from_slice(data);
        if inner.pending.len() >= WRITE_BUFFER_LIMIT {
            if let Err(err) = inner.write_out() {
                // Only the bytes from earlier appends stay queued for retry.
                inner.pending.truncate(buffered);
                return Err(err);
            }
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        inner.write_out()?;
        inner.file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Ok(());
        }
        let inner = self.inner.get_mut();
        inner.write_out()?;
        inner.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly);
        }
        let inner = self.inner.get_mut();
        let size = inner.size();
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        inner.write_out()?;
        inner.file.set_len(new_size)?;
        inner.file.sync_all()?;
        inner.written = new_size;
        Ok(())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        // Nothing to report to at this point; a lost tail shows up as a torn
        // record on the next open.
        let _ = self.inner.get_mut().write_out();
    }
}
