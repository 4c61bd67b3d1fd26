//! Header and record framing.

use crate::crc::crc32;
use crate::error::{CoreError, CoreResult};

/// Magic bytes at the start of every table file.
pub const MAGIC: [u8; 4] = *b"CMEN";

/// Version of the framing itself, independent of the caller's key schema.
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_LEN: u64 = 16;

/// Length prefix plus trailing checksum.
pub const RECORD_OVERHEAD: usize = 8;

/// The fixed-size table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Caller-supplied key schema version.
    pub version: u32,
}

impl Header {
    /// Encodes to exactly [`HEADER_LEN`] bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        // 6..8 reserved
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        let crc = crc32(&buf[..12]);
        buf[12..16].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] for a short buffer, wrong magic or
    /// unknown framing version, and [`CoreError::ChecksumMismatch`] if the
    /// header checksum does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < HEADER_LEN as usize {
            return Err(CoreError::invalid_format("header too short"));
        }
        if data[0..4] != MAGIC {
            return Err(CoreError::invalid_format("bad magic"));
        }

        let stored = read_u32(&data[12..16]);
        let computed = crc32(&data[..12]);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                offset: 0,
                expected: stored,
                actual: computed,
            });
        }

        let format = u16::from_le_bytes([data[4], data[5]]);
        if format != FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported framing version {format}"
            )));
        }

        Ok(Self {
            version: read_u32(&data[8..12]),
        })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Frames `key` as `| record_len (4) | key (N) | crc32 (4) |`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidFormat`] if the key does not fit a `u32`
/// length.
pub fn encode_record(key: &[u8]) -> CoreResult<Vec<u8>> {
    let record_len = u32::try_from(key.len() + RECORD_OVERHEAD)
        .map_err(|_| CoreError::invalid_format("key too large"))?;

    let mut buf = Vec::with_capacity(record_len as usize);
    buf.extend_from_slice(&record_len.to_le_bytes());
    buf.extend_from_slice(key);
    let crc = crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// One step of a [`FrameReader`].
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A complete, verified record.
    Record {
        /// Absolute offset of the record.
        offset: u64,
        /// Encoded key.
        key: &'a [u8],
    },
    /// The buffer ends inside a record; bytes from `offset` on are a torn
    /// write.
    Torn {
        /// Absolute offset of the incomplete record.
        offset: u64,
    },
    /// Clean end of data.
    End,
}

/// Walks the records of a buffer read from a table file.
#[derive(Debug)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    base: u64,
    pos: usize,
    key_len: Option<usize>,
}

impl<'a> FrameReader<'a> {
    /// Reads `buf`, whose first byte sits at absolute offset `base`.
    #[must_use]
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self {
            buf,
            base,
            pos: 0,
            key_len: None,
        }
    }

    /// Requires every record to carry a key of exactly `key_len` bytes.
    ///
    /// Any other length is then corruption, even one that runs past the end
    /// of the buffer.
    #[must_use]
    pub fn with_key_len(mut self, key_len: Option<usize>) -> Self {
        self.key_len = key_len;
        self
    }

    /// Decodes the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ChecksumMismatch`] for a damaged record and
    /// [`CoreError::InvalidFormat`] for an impossible length.
    pub fn next_frame(&mut self) -> CoreResult<Frame<'a>> {
        let offset = self.base + self.pos as u64;
        let rest = &self.buf[self.pos..];
        if rest.is_empty() {
            return Ok(Frame::End);
        }
        if rest.len() < 4 {
            return Ok(Frame::Torn { offset });
        }

        let record_len = read_u32(rest) as usize;
        if record_len < RECORD_OVERHEAD {
            return Err(CoreError::invalid_format(format!(
                "record at offset {offset} claims length {record_len}"
            )));
        }
        if let Some(key_len) = self.key_len {
            if record_len != key_len + RECORD_OVERHEAD {
                return Err(CoreError::invalid_format(format!(
                    "record at offset {offset} claims length {record_len}, expected {}",
                    key_len + RECORD_OVERHEAD
                )));
            }
        }
        if rest.len() < record_len {
            return Ok(Frame::Torn { offset });
        }

        let body = &rest[..record_len - 4];
        let expected = read_u32(&rest[record_len - 4..record_len]);
        let actual = crc32(body);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }

        self.pos += record_len;
        Ok(Frame::Record {
            offset,
            key: &body[4..],
        })
    }
}
