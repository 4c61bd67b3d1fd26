//! Fault-injecting backend wrapper.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Toggles shared between a [`FaultyBackend`] and whoever drives the test.
#[derive(Debug, Default)]
pub struct FaultSwitch {
    fail_reads: AtomicBool,
    fail_appends: AtomicBool,
    fail_syncs: AtomicBool,
}

impl FaultSwitch {
    /// Creates a switch with every fault disabled.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `read_at` fail.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Makes `append` and `truncate` fail.
    pub fn fail_appends(&self, on: bool) {
        self.fail_appends.store(on, Ordering::SeqCst);
    }

    /// Makes `flush` and `sync` fail.
    pub fn fail_syncs(&self, on: bool) {
        self.fail_syncs.store(on, Ordering::SeqCst);
    }

    /// Clears every fault.
    pub fn heal(&self) {
        self.fail_reads(false);
        self.fail_appends(false);
        self.fail_syncs(false);
    }
}

/// Wraps another backend and fails operations selected by a [`FaultSwitch`].
///
/// ```rust
/// use commitmap_storage::{FaultSwitch, FaultyBackend, InMemoryBackend, StorageBackend};
///
/// let switch = FaultSwitch::new();
/// let mut backend = FaultyBackend::new(InMemoryBackend::new(), switch.clone());
/// switch.fail_appends(true);
/// assert!(backend.append(b"x").is_err());
/// ```
#[derive(Debug)]
pub struct FaultyBackend<B> {
    inner: B,
    switch: Arc<FaultSwitch>,
}

impl<B: StorageBackend> FaultyBackend<B> {
    /// Wraps `inner`, consulting `switch` before each operation.
    pub fn new(inner: B, switch: Arc<FaultSwitch>) -> Self {
        Self { inner, switch }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

fn check(flag: &AtomicBool, what: &'static str) -> StorageResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(StorageError::Injected(what))
    } else {
        Ok(())
    }
}

impl<B: StorageBackend> StorageBackend for FaultyBackend<B> {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        check(&self.switch.fail_reads, "read")?;
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        check(&self.switch.fail_appends, "append")?;
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        check(&self.switch.fail_syncs, "flush")?;
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        check(&self.switch.fail_syncs, "sync")?;
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        check(&self.switch.fail_appends, "truncate")?;
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;

    #[test]
    fn passes_through_when_healthy() {
        let switch = FaultSwitch::new();
        let mut backend = FaultyBackend::new(InMemoryBackend::new(), switch);
        backend.append(b"ok").unwrap();
        backend.sync().unwrap();
        assert_eq!(backend.read_at(0, 2).unwrap(), b"ok");
        assert_eq!(backend.inner().snapshot(), b"ok");
    }

    #[test]
    fn each_switch_fails_its_operations() {
        let switch = FaultSwitch::new();
        let mut backend = FaultyBackend::new(InMemoryBackend::new(), switch.clone());
        backend.append(b"data").unwrap();

        switch.fail_reads(true);
        assert!(matches!(backend.read_at(0, 1), Err(StorageError::Injected("read"))));

        switch.fail_syncs(true);
        assert!(matches!(backend.sync(), Err(StorageError::Injected("sync"))));
        assert!(matches!(backend.flush(), Err(StorageError::Injected("flush"))));

        switch.fail_appends(true);
        assert!(matches!(backend.append(b"x"), Err(StorageError::Injected("append"))));
        assert!(backend.truncate(0).is_err());

        switch.heal();
        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.read_at(0, 4).unwrap(), b"data");
    }
}
