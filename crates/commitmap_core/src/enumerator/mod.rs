//! Persistent key enumerator.
//!
//! Assigns every distinct key a dense `u32` id and remembers it across
//! restarts. The table file is append-only:
//!
//! ```text
//! | magic "CMEN" (4) | framing version (2) | reserved (2) | key version (4) | crc32 (4) |
//! | record_len (4) | key (N) | crc32 (4) |   <- record 0
//! | record_len (4) | key (N) | crc32 (4) |   <- record 1
//! ...
//! ```
//!
//! ## Recovery Policy
//!
//! - A record cut off at the end of the file is a torn write and is dropped.
//! - A checksum mismatch, an impossible length or a duplicate key is fatal;
//!   the caller decides whether to rebuild (see
//!   [`crate::Config::recreate_on_corruption`]). With fixed-width keys any
//!   length other than the key width is impossible, so a damaged length in
//!   the middle of the file is never mistaken for a torn tail.
//! - A key version other than the requested one is
//!   [`crate::CoreError::VersionMismatch`].

mod descriptor;
mod record;
mod store;

pub use descriptor::{CommitIdDescriptor, KeyDescriptor, RawKeyDescriptor};
pub use record::{FORMAT_VERSION, HEADER_LEN, MAGIC};
pub use store::{summarize, walk_table, PersistentEnumerator, TableSummary};
