//! The persistent enumerator.

use crate::enumerator::descriptor::KeyDescriptor;
use crate::enumerator::record::{
    encode_record, Frame, FrameReader, Header, HEADER_LEN, RECORD_OVERHEAD,
};
use crate::error::{CoreError, CoreResult};
use commitmap_storage::StorageBackend;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Ids at or above this value are never handed out.
const MAX_ID: u32 = u32::MAX;

/// In-memory view of the table.
#[derive(Debug)]
struct State<K> {
    /// Key -> id.
    ids: HashMap<K, u32>,
    /// Id -> record offset.
    offsets: Vec<u64>,
    /// Offset just past the last complete record.
    end: u64,
}

impl<K> State<K> {
    /// Byte range of record `id`.
    fn span(&self, id: u32) -> Option<(u64, usize)> {
        let idx = id as usize;
        let start = *self.offsets.get(idx)?;
        let stop = self.offsets.get(idx + 1).copied().unwrap_or(self.end);
        Some((start, (stop - start) as usize))
    }
}

/// An append-only, insert-if-absent map from keys to dense integer ids.
///
/// Each distinct key is stored once; its id is its position in the file,
/// so ids start at 0, grow by one and never change. The key -> id map lives
/// in memory and is rebuilt from the file on open; reverse lookups read the
/// record back from storage.
///
/// # Thread Safety
///
/// All methods take `&self`. Lookups of known keys share a read lock; a
/// first-time insert takes the write lock and checks again, so concurrent
/// inserts of the same key produce one record.
///
/// # Example
///
/// ```rust
/// use commitmap_core::{PersistentEnumerator, RawKeyDescriptor};
/// use commitmap_storage::InMemoryBackend;
///
/// let table = PersistentEnumerator::open(
///     Box::new(InMemoryBackend::new()),
///     RawKeyDescriptor,
///     1,
/// ).unwrap();
///
/// let id = table.enumerate(&b"abc".to_vec()).unwrap();
/// assert_eq!(table.enumerate(&b"abc".to_vec()).unwrap(), id);
/// assert_eq!(table.value_of(id).unwrap(), Some(b"abc".to_vec()));
/// ```
pub struct PersistentEnumerator<K, D> {
    /// `None` once closed.
    backend: RwLock<Option<Box<dyn StorageBackend>>>,
    descriptor: D,
    state: RwLock<State<K>>,
    version: u32,
    _key: PhantomData<fn() -> K>,
}

impl<K, D> PersistentEnumerator<K, D>
where
    K: Clone + Eq + Hash,
    D: KeyDescriptor<K>,
{
    /// Opens a table over `backend`, writing a fresh header if it is empty.
    ///
    /// A record cut short by a crash is dropped and the file truncated to
    /// the last complete record.
    ///
    /// # Errors
    ///
    /// - [`CoreError::VersionMismatch`] if the header carries another version
    /// - [`CoreError::InvalidFormat`] or [`CoreError::ChecksumMismatch`] for
    ///   damaged headers, damaged records or duplicate keys
    /// - storage errors
    pub fn open(mut backend: Box<dyn StorageBackend>, descriptor: D, version: u32) -> CoreResult<Self> {
        let size = backend.size()?;
        if size == 0 {
            backend.append(&Header { version }.encode())?;
            backend.flush()?;
            debug!(version, "created empty enumerator");
            return Ok(Self::assemble(backend, descriptor, version, State {
                ids: HashMap::new(),
                offsets: Vec::new(),
                end: HEADER_LEN,
            }));
        }

        if size < HEADER_LEN {
            return Err(CoreError::invalid_format(format!(
                "file of {size} bytes has no complete header"
            )));
        }
        let header = Header::decode(&backend.read_at(0, HEADER_LEN as usize)?)?;
        if header.version != version {
            return Err(CoreError::VersionMismatch {
                expected: version,
                found: header.version,
            });
        }

        let data = backend.read_at(HEADER_LEN, (size - HEADER_LEN) as usize)?;
        let mut reader = FrameReader::new(&data, HEADER_LEN).with_key_len(descriptor.fixed_len());
        let mut ids = HashMap::new();
        let mut offsets = Vec::new();
        let end = loop {
            match reader.next_frame()? {
                Frame::Record { offset, key } => {
                    let key = descriptor.read(key)?;
                    let id = u32::try_from(offsets.len())
                        .map_err(|_| CoreError::invalid_format("too many records"))?;
                    if ids.insert(key, id).is_some() {
                        return Err(CoreError::invalid_format(format!(
                            "duplicate key in record {id} at offset {offset}"
                        )));
                    }
                    offsets.push(offset);
                }
                Frame::Torn { offset } => {
                    warn!(
                        offset,
                        dropped = size - offset,
                        "discarding incomplete trailing record"
                    );
                    backend.truncate(offset)?;
                    break offset;
                }
                Frame::End => break size,
            }
        };

        debug!(version, entries = offsets.len(), bytes = end, "opened enumerator");
        Ok(Self::assemble(backend, descriptor, version, State { ids, offsets, end }))
    }

    fn assemble(backend: Box<dyn StorageBackend>, descriptor: D, version: u32, state: State<K>) -> Self {
        Self {
            backend: RwLock::new(Some(backend)),
            descriptor,
            state: RwLock::new(state),
            version,
            _key: PhantomData,
        }
    }

    /// Returns the id of `key`, storing it first if it is new.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after [`Self::close`],
    /// [`CoreError::CapacityExhausted`] when the id space is used up, or
    /// the descriptor's or backend's error. A failed insert leaves no
    /// visible trace: the key stays absent and no id is consumed.
    pub fn enumerate(&self, key: &K) -> CoreResult<u32> {
        self.ensure_open()?;
        if let Some(&id) = self.state.read().ids.get(key) {
            return Ok(id);
        }

        let mut state = self.state.write();
        if let Some(&id) = state.ids.get(key) {
            return Ok(id);
        }

        let next = state.offsets.len();
        let id = u32::try_from(next)
            .ok()
            .filter(|&id| id < MAX_ID)
            .ok_or(CoreError::CapacityExhausted(MAX_ID))?;

        let mut encoded = Vec::new();
        self.descriptor.save(key, &mut encoded)?;
        let frame = encode_record(&encoded)?;

        let mut guard = self.backend.write();
        let backend = guard.as_mut().ok_or(CoreError::Closed)?;
        let offset = match backend.append(&frame) {
            Ok(offset) => offset,
            Err(err) => {
                // A half-written record would shift every later id on reopen.
                if backend.size().map_or(true, |size| size != state.end) {
                    if let Err(repair) = backend.truncate(state.end) {
                        warn!(error = %repair, "could not roll back failed append");
                    }
                }
                return Err(err.into());
            }
        };
        drop(guard);

        state.offsets.push(offset);
        state.end = offset + frame.len() as u64;
        state.ids.insert(key.clone(), id);
        Ok(id)
    }

    /// Returns the id of `key` without inserting it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] after [`Self::close`].
    pub fn try_enumerate(&self, key: &K) -> CoreResult<Option<u32>> {
        self.ensure_open()?;
        Ok(self.state.read().ids.get(key).copied())
    }

    /// Reads back the key stored under `id`, or `None` if `id` was never
    /// assigned.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`], a checksum or format error for a
    /// damaged record, or a storage error.
    pub fn value_of(&self, id: u32) -> CoreResult<Option<K>> {
        let Some((offset, len)) = self.state.read().span(id) else {
            self.ensure_open()?;
            return Ok(None);
        };

        let guard = self.backend.read();
        let backend = guard.as_ref().ok_or(CoreError::Closed)?;
        let data = backend.read_at(offset, len)?;
        drop(guard);

        let mut reader = FrameReader::new(&data, offset).with_key_len(self.descriptor.fixed_len());
        match reader.next_frame()? {
            Frame::Record { key, .. } => self.descriptor.read(key).map(Some),
            Frame::Torn { .. } | Frame::End => Err(CoreError::invalid_format(format!(
                "record {id} at offset {offset} is incomplete"
            ))),
        }
    }

    /// Calls `visit` on every key in id order until it returns `false`.
    ///
    /// Keys inserted while the scan runs are not visited. Returns `true` if
    /// every key was visited.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or a read/decode error.
    pub fn iterate_data<F>(&self, mut visit: F) -> CoreResult<bool>
    where
        F: FnMut(&K) -> bool,
    {
        let end = self.state.read().end;

        let guard = self.backend.read();
        let backend = guard.as_ref().ok_or(CoreError::Closed)?;
        let data = backend.read_at(HEADER_LEN, (end - HEADER_LEN) as usize)?;
        drop(guard);

        let mut reader =
            FrameReader::new(&data, HEADER_LEN).with_key_len(self.descriptor.fixed_len());
        loop {
            match reader.next_frame()? {
                Frame::Record { key, .. } => {
                    if !visit(&self.descriptor.read(key)?) {
                        return Ok(false);
                    }
                }
                Frame::End => return Ok(true),
                Frame::Torn { offset } => {
                    return Err(CoreError::invalid_format(format!(
                        "incomplete record at offset {offset}"
                    )))
                }
            }
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().offsets.len()
    }

    /// Whether no key is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the table in bytes, header included.
    #[must_use]
    pub fn data_size(&self) -> u64 {
        self.state.read().end
    }

    /// Schema version the table was opened with.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The key codec.
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// Hands buffered inserts to the OS without waiting for the disk.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the backend's flush error.
    pub fn flush(&self) -> CoreResult<()> {
        let mut guard = self.backend.write();
        let backend = guard.as_mut().ok_or(CoreError::Closed)?;
        backend.flush()?;
        Ok(())
    }

    /// Makes every insert so far durable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Closed`] or the backend's sync error.
    pub fn force(&self) -> CoreResult<()> {
        let mut guard = self.backend.write();
        let backend = guard.as_mut().ok_or(CoreError::Closed)?;
        backend.sync()?;
        Ok(())
    }

    /// Syncs and releases the backend. Calling it again is a no-op.
    ///
    /// The backend is released even if the final sync fails.
    ///
    /// # Errors
    ///
    /// Returns the sync error from the first call.
    pub fn close(&self) -> CoreResult<()> {
        let Some(mut backend) = self.backend.write().take() else {
            return Ok(());
        };
        backend.sync()?;
        debug!(entries = self.len(), "closed enumerator");
        Ok(())
    }

    /// Whether [`Self::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.backend.read().is_none()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<K, D> std::fmt::Debug for PersistentEnumerator<K, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PersistentEnumerator")
            .field("version", &self.version)
            .field("entries", &state.offsets.len())
            .field("end", &state.end)
            .field("closed", &self.backend.read().is_none())
            .finish()
    }
}

/// Result of a read-only walk over a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    /// Schema version from the header.
    pub version: u32,
    /// Complete, verified records.
    pub records: usize,
    /// Offset just past the last verified record.
    pub valid_bytes: u64,
    /// Total bytes in the store.
    pub total_bytes: u64,
    /// Offset of an incomplete trailing record, if any.
    pub torn_at: Option<u64>,
}

/// Reads the header and everything after it.
fn read_table(backend: &dyn StorageBackend) -> CoreResult<(Header, u64, Vec<u8>)> {
    let size = backend.size()?;
    if size < HEADER_LEN {
        return Err(CoreError::invalid_format(format!(
            "file of {size} bytes has no complete header"
        )));
    }
    let header = Header::decode(&backend.read_at(0, HEADER_LEN as usize)?)?;
    let data = backend.read_at(HEADER_LEN, (size - HEADER_LEN) as usize)?;
    Ok((header, size, data))
}

/// Walks a table without modifying it, verifying every checksum.
///
/// Keys are not decoded, so no root registry is needed. Pass the key width
/// when the table's keys have a fixed size (for commit tables,
/// [`CommitIdDescriptor::KEY_LEN`](crate::CommitIdDescriptor::KEY_LEN)) so
/// a damaged length field is reported instead of read as a torn tail.
///
/// # Errors
///
/// Returns the first header, framing or storage error met.
pub fn summarize(backend: &dyn StorageBackend, key_len: Option<usize>) -> CoreResult<TableSummary> {
    let (header, size, data) = read_table(backend)?;

    let mut reader = FrameReader::new(&data, HEADER_LEN).with_key_len(key_len);
    let mut records = 0;
    let mut valid_bytes = HEADER_LEN;
    let torn_at = loop {
        match reader.next_frame()? {
            Frame::Record { offset, key } => {
                records += 1;
                valid_bytes = offset + (key.len() + RECORD_OVERHEAD) as u64;
            }
            Frame::Torn { offset } => break Some(offset),
            Frame::End => break None,
        }
    };

    Ok(TableSummary {
        version: header.version,
        records,
        valid_bytes,
        total_bytes: size,
        torn_at,
    })
}

/// Decodes the keys of a table in id order without modifying it.
///
/// Unlike [`PersistentEnumerator::open`], an incomplete trailing record is
/// left in place and only noted in the returned summary. Stops early when
/// `visit` returns `false`.
///
/// # Errors
///
/// - [`CoreError::VersionMismatch`] if the header carries another version
/// - header, framing, decode or storage errors
pub fn walk_table<K, D, F>(
    backend: &dyn StorageBackend,
    descriptor: &D,
    version: u32,
    mut visit: F,
) -> CoreResult<TableSummary>
where
    D: KeyDescriptor<K>,
    F: FnMut(u32, K) -> bool,
{
    let (header, size, data) = read_table(backend)?;
    if header.version != version {
        return Err(CoreError::VersionMismatch {
            expected: version,
            found: header.version,
        });
    }

    let mut reader = FrameReader::new(&data, HEADER_LEN).with_key_len(descriptor.fixed_len());
    let mut records = 0usize;
    let mut valid_bytes = HEADER_LEN;
    let torn_at = loop {
        match reader.next_frame()? {
            Frame::Record { offset, key } => {
                let id = u32::try_from(records)
                    .map_err(|_| CoreError::invalid_format("too many records"))?;
                records += 1;
                valid_bytes = offset + (key.len() + RECORD_OVERHEAD) as u64;
                if !visit(id, descriptor.read(key)?) {
                    break None;
                }
            }
            Frame::Torn { offset } => {
                debug!(offset, "incomplete trailing record left in place");
                break Some(offset);
            }
            Frame::End => break None,
        }
    };

    Ok(TableSummary {
        version: header.version,
        records,
        valid_bytes,
        total_bytes: size,
        torn_at,
    })
}
