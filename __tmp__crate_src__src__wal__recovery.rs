//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::path::Path;

use super::entry::HEADER_SIZE;
use super::WalEntry;
use crate::error::Result;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes or trailing corruption removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file.
    ///
    /// Reads every complete, checksum-valid entry in order. Stops at the
    /// first partial write or corrupted entry — recovery does not attempt to
    /// resynchronize past a bad length field, since that length is the only
    /// thing telling us where the next entry begins.
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let bytes = std::fs::read(path)?;
        let (entries, result) = Self::scan(&bytes);
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it.
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let bytes = std::fs::read(path)?;
        let (_, result) = Self::scan(&bytes);
        Ok(result)
    }

    fn scan(bytes: &[u8]) -> (Vec<WalEntry>, RecoveryResult) {
        let mut entries = Vec::new();
        let mut entries_recovered = 0u64;
        let mut entries_corrupted = 0u64;
        let mut last_lsn = 0u64;
        let mut was_truncated = false;
        let mut position = 0usize;

        loop {
            if position >= bytes.len() {
                break;
            }

            if position + HEADER_SIZE > bytes.len() {
                was_truncated = true;
                break;
            }

            let data_len =
                u32::from_le_bytes(bytes[position + 12..position + 16].try_into().unwrap())
                    as usize;

            if position + HEADER_SIZE + data_len > bytes.len() {
                was_truncated = true;
                break;
            }

            let slice = &bytes[position..position + HEADER_SIZE + data_len];
            match WalEntry::deserialize(slice) {
                Ok(entry) => {
                    last_lsn = entry.lsn;
                    entries_recovered += 1;
                    entries.push(entry);
                    position += HEADER_SIZE + data_len;
                }
                Err(_) => {
                    entries_corrupted += 1;
                    was_truncated = true;
                    break;
                }
            }
        }

        (
            entries,
            RecoveryResult {
                entries_recovered,
                entries_corrupted,
                last_lsn,
                was_truncated,
            },
        )
    }
}
