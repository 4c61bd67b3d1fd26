//! # commitmap storage
//!
//! Append-only byte stores underneath the commit-hash index.
//!
//! Backends know nothing about enumerator headers, records or checksums.
//! They hand out offsets for appended bytes, read them back, and make them
//! durable on request.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway indexes
//! - [`FileBackend`] - Buffered file storage that survives restarts
//! - [`FaultyBackend`] - Wrapper that fails operations on demand
//!
//! ## Example
//!
//! ```rust
//! use commitmap_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"abc").unwrap();
//! assert_eq!(backend.read_at(offset, 3).unwrap(), b"abc");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod fault;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use fault::{FaultSwitch, FaultyBackend};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
