//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use serde::{Deserialize, Serialize};

use crate::error::{RidgeError, Result};

/// Size in bytes of the on-disk entry header: LSN(8) + CRC(4) + Len(4).
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl WalEntry {
    /// Build a new entry, stamping it with the current wall-clock time.
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to `LSN(8) | CRC32(4) | Len(4) | bincode(WalEntry)`.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = self.encode_body()?;
        let crc = Self::crc_of(&data);

        let mut buf = Vec::with_capacity(HEADER_SIZE + data.len());
        buf.extend_from_slice(&self.lsn.to_le_bytes());
        buf.extend_from_slice(&crc.to_le_bytes());
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&data);
        Ok(buf)
    }

    /// Deserialize a full `header | data` buffer, verifying the CRC.
    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(RidgeError::DecodeError(format!(
                "WAL entry header truncated: need {HEADER_SIZE} bytes, got {}",
                buf.len()
            )));
        }

        let stored_crc = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let data_len = u32::from_le_bytes(buf[12..16].try_into().unwrap()) as usize;

        if buf.len() < HEADER_SIZE + data_len {
            return Err(RidgeError::DecodeError(format!(
                "WAL entry data truncated: need {data_len} bytes, got {}",
                buf.len() - HEADER_SIZE
            )));
        }

        let data = &buf[HEADER_SIZE..HEADER_SIZE + data_len];
        let computed_crc = Self::crc_of(data);
        if computed_crc != stored_crc {
            return Err(RidgeError::WalCorruption(format!(
                "CRC mismatch: stored {stored_crc}, computed {computed_crc}"
            )));
        }

        let entry: WalEntry =
            bincode::deserialize(data).map_err(|e| RidgeError::DecodeError(e.to_string()))?;
        Ok(entry)
    }

    /// Total on-disk size this entry would occupy once serialized.
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + self.encode_body()?.len())
    }

    /// CRC32 over this entry's serialized body.
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(Self::crc_of(&self.encode_body()?))
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| RidgeError::EncodeError(e.to_string()))
    }

    fn crc_of(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}
