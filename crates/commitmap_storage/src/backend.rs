//! The backend trait.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// The enumerator owns all interpretation of the bytes. A backend only
/// guarantees that:
///
/// - `append` returns the offset the bytes landed at, which equals the
///   previous `size`
/// - `read_at` returns exactly what was appended at that offset, including
///   bytes not yet made durable
/// - after `sync` returns, everything appended so far survives a crash
///
/// Backends are shared behind a lock by their owner, so they only need to be
/// `Send + Sync`, not internally synchronized for concurrent mutation.
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Hands buffered bytes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the write-out fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Flushes and fsyncs. After success, all appended bytes are durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Current logical size, including buffered bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the store back to `new_size` bytes.
    ///
    /// Used to drop a torn trailing record after a crash.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the store, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        (**self).read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        (**self).append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        (**self).flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        (**self).sync()
    }

    fn size(&self) -> StorageResult<u64> {
        (**self).size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        (**self).truncate(new_size)
    }
}
