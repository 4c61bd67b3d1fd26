//! In-memory backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A byte store held entirely in memory.
///
/// Clones share the same bytes, which lets a test keep a handle to the data
/// after handing the backend to an index, then reopen a new index over it to
/// simulate a restart.
///
/// ```rust
/// use commitmap_storage::{InMemoryBackend, StorageBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let shared = backend.clone();
/// backend.append(b"x").unwrap();
/// assert_eq!(shared.size().unwrap(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites one byte in place. Used to simulate bit rot in tests.
    ///
    /// Returns `false` if `offset` is out of range.
    pub fn corrupt_byte(&self, offset: usize) -> bool {
        match self.data.write().get_mut(offset) {
            Some(byte) => {
                *byte ^= 0xFF;
                true
            }
            None => false,
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        if offset.saturating_add(len as u64) > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn append_returns_previous_size() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"ab").unwrap(), 0);
        assert_eq!(backend.append(b"").unwrap(), 2);
        assert_eq!(backend.append(b"c").unwrap(), 2);
        assert_eq!(backend.size().unwrap(), 3);
    }

    #[test]
    fn clones_share_contents() {
        let mut backend = InMemoryBackend::new();
        let other = backend.clone();
        backend.append(b"shared").unwrap();
        assert_eq!(other.snapshot(), b"shared");
    }

    #[test]
    fn read_out_of_range_fails() {
        let backend = InMemoryBackend::with_data(b"abc".to_vec());
        assert!(matches!(
            backend.read_at(1, 3),
            Err(StorageError::ReadPastEnd { offset: 1, len: 3, size: 3 })
        ));
        assert!(backend.read_at(u64::MAX, 1).is_err());
    }

    #[test]
    fn corrupt_byte_flips_bits() {
        let backend = InMemoryBackend::with_data(vec![0x0F]);
        assert!(backend.corrupt_byte(0));
        assert!(!backend.corrupt_byte(1));
        assert_eq!(backend.snapshot(), vec![0xF0]);
    }

    #[test]
    fn truncate_rejects_growth() {
        let mut backend = InMemoryBackend::with_data(b"hello".to_vec());
        backend.truncate(2).unwrap();
        assert_eq!(backend.snapshot(), b"he");
        assert!(backend.truncate(3).is_err());
    }

    proptest! {
        #[test]
        fn reads_return_appended_chunks(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..16)) {
            let mut backend = InMemoryBackend::new();
            let offsets: Vec<u64> = chunks.iter().map(|c| backend.append(c).unwrap()).collect();
            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
        }
    }
}
