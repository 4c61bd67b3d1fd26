//! Key codecs for the enumerator.

use crate::commit::CommitId;
use crate::error::{CoreError, CoreResult};
use crate::hash::{Hash, HASH_LEN};
use crate::root::RootRegistry;
use std::sync::Arc;

/// Serializes enumerator keys.
///
/// Equal keys must encode to equal bytes; the enumerator relies on `K`'s
/// own `Eq + Hash` for deduplication and only uses the bytes for storage.
pub trait KeyDescriptor<K>: Send + Sync {
    /// Appends the encoded form of `key` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be represented.
    fn save(&self, key: &K, out: &mut Vec<u8>) -> CoreResult<()>;

    /// Decodes a key previously written by [`KeyDescriptor::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid key.
    fn read(&self, data: &[u8]) -> CoreResult<K>;

    /// Width of every encoded key, for codecs whose keys all have the same
    /// size. Lets a reader reject a damaged length field instead of taking
    /// it for a torn write.
    fn fixed_len(&self) -> Option<usize> {
        None
    }
}

/// Encodes a [`CommitId`] as `| hash (20) | root index (4, big-endian) |`.
///
/// Root paths never reach the disk; the index is resolved against the
/// registry the table was opened with.
#[derive(Debug, Clone)]
pub struct CommitIdDescriptor {
    registry: Arc<RootRegistry>,
}

impl CommitIdDescriptor {
    /// Encoded key width.
    pub const KEY_LEN: usize = HASH_LEN + 4;

    /// Creates a descriptor over `registry`.
    #[must_use]
    pub fn new(registry: Arc<RootRegistry>) -> Self {
        Self { registry }
    }

    /// The registry used to number roots.
    #[must_use]
    pub fn registry(&self) -> &Arc<RootRegistry> {
        &self.registry
    }
}

impl KeyDescriptor<CommitId> for CommitIdDescriptor {
    fn save(&self, key: &CommitId, out: &mut Vec<u8>) -> CoreResult<()> {
        let root_index =
            self.registry
                .index_of(key.root())
                .ok_or_else(|| CoreError::UnknownRoot {
                    path: key.root().path().to_path_buf(),
                })?;

        out.extend_from_slice(key.hash().as_bytes());
        out.extend_from_slice(&root_index.to_be_bytes());
        Ok(())
    }

    fn read(&self, data: &[u8]) -> CoreResult<CommitId> {
        if data.len() != Self::KEY_LEN {
            return Err(CoreError::invalid_format(format!(
                "commit key is {} bytes, expected {}",
                data.len(),
                Self::KEY_LEN
            )));
        }

        let hash = Hash::from_slice(&data[..HASH_LEN])?;
        let index = u32::from_be_bytes([
            data[HASH_LEN],
            data[HASH_LEN + 1],
            data[HASH_LEN + 2],
            data[HASH_LEN + 3],
        ]);
        let root = self
            .registry
            .get(index)
            .ok_or(CoreError::RootIndexOutOfRange {
                index,
                len: self.registry.len(),
            })?;

        Ok(CommitId::new(hash, root.clone()))
    }

    fn fixed_len(&self) -> Option<usize> {
        Some(Self::KEY_LEN)
    }
}

/// Stores keys as opaque bytes.
///
/// Lets tooling walk a table without knowing the root set it was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawKeyDescriptor;

impl KeyDescriptor<Vec<u8>> for RawKeyDescriptor {
    fn save(&self, key: &Vec<u8>, out: &mut Vec<u8>) -> CoreResult<()> {
        out.extend_from_slice(key);
        Ok(())
    }

    fn read(&self, data: &[u8]) -> CoreResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}
