//! On-disk record format
//!
//! Every value RidgeKV stores — in the WAL, in a memtable snapshot, or in an
//! SSTable data block — is framed as a fixed 17-byte header followed by the
//! raw key and value bytes. The header carries a CRC32 checksum so a reader
//! can detect torn writes and bit rot without consulting anything else.

use crate::error::{RidgeError, Result};

/// Size in bytes of the encoded [`Header`].
pub const HEADER_SIZE: usize = 17;

/// Fixed-size record header.
///
/// Wire layout (little-endian):
/// `checksum:u32 | tombstone:u8 | timestamp:u32 | key_size:u32 | value_size:u32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub checksum: u32,
    pub tombstone: bool,
    pub timestamp: u32,
    pub key_size: u32,
    pub value_size: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[4] = self.tombstone as u8;
        buf[5..9].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[9..13].copy_from_slice(&self.key_size.to_le_bytes());
        buf[13..17].copy_from_slice(&self.value_size.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RidgeError::DecodeError(format!(
                "header truncated: need {HEADER_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let checksum = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let tombstone = buf[4] != 0;
        let timestamp = u32::from_le_bytes(buf[5..9].try_into().unwrap());
        let key_size = u32::from_le_bytes(buf[9..13].try_into().unwrap());
        let value_size = u32::from_le_bytes(buf[13..17].try_into().unwrap());
        Ok(Self {
            checksum,
            tombstone,
            timestamp,
            key_size,
            value_size,
        })
    }
}

/// A single key/value entry as stored on disk (WAL, SSTable data block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: Header,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    /// Build a live (non-tombstone) record, computing its checksum.
    pub fn new(key: Vec<u8>, value: Vec<u8>, timestamp: u32) -> Self {
        Self::build(key, value, timestamp, false)
    }

    /// Build a tombstone record for `key`.
    pub fn tombstone(key: Vec<u8>, timestamp: u32) -> Self {
        Self::build(key, Vec::new(), timestamp, true)
    }

    fn build(key: Vec<u8>, value: Vec<u8>, timestamp: u32, tombstone: bool) -> Self {
        let key_size = key.len() as u32;
        let value_size = value.len() as u32;
        let checksum = Self::compute_checksum(tombstone, timestamp, key_size, value_size, &key, &value);
        Self {
            header: Header {
                checksum,
                tombstone,
                timestamp,
                key_size,
                value_size,
            },
            key,
            value,
        }
    }

    /// CRC32 over `tombstone ‖ timestamp ‖ key_size ‖ value_size ‖ key ‖ value`.
    pub fn compute_checksum(
        tombstone: bool,
        timestamp: u32,
        key_size: u32,
        value_size: u32,
        key: &[u8],
        value: &[u8],
    ) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[tombstone as u8]);
        hasher.update(&timestamp.to_le_bytes());
        hasher.update(&key_size.to_le_bytes());
        hasher.update(&value_size.to_le_bytes());
        hasher.update(key);
        hasher.update(value);
        hasher.finalize()
    }

    /// Total on-disk footprint: header + key + value.
    pub fn total_size(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.value.len()
    }

    pub fn is_tombstone(&self) -> bool {
        self.header.tombstone
    }

    /// Encode header + key + value into a single buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.total_size());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf
    }

    /// Decode a record from `buf`, verifying the checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let header = Header::decode(buf)?;
        let key_size = header.key_size as usize;
        let value_size = header.value_size as usize;
        let needed = HEADER_SIZE + key_size + value_size;
        if buf.len() < needed {
            return Err(RidgeError::DecodeError(format!(
                "record body truncated: need {needed} bytes, got {}",
                buf.len()
            )));
        }
        let key = buf[HEADER_SIZE..HEADER_SIZE + key_size].to_vec();
        let value = buf[HEADER_SIZE + key_size..needed].to_vec();

        let computed = Self::compute_checksum(
            header.tombstone,
            header.timestamp,
            header.key_size,
            header.value_size,
            &key,
            &value,
        );
        if computed != header.checksum {
            return Err(RidgeError::ChecksumMismatch {
                stored: header.checksum,
                computed,
            });
        }

        Ok((
            Self {
                header,
                key,
                value,
            },
            needed,
        ))
    }
}
