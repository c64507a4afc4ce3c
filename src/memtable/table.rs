//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency. Entries are kept as
//! full [`Record`]s (header, key, value) rather than raw bytes so a flush can
//! carry timestamps and checksums straight into an SSTable without
//! recomputing them, and so `size()` reflects the same on-disk footprint a
//! flushed record will occupy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use super::MemTableEntry;
use crate::record::Record;

fn now_ts() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// In-memory table for recent writes.
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, Record>>,
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.get_record(key).map(|r| MemTableEntry::from(&r))
    }

    /// Get the full record for a key, if present. Used by flush and by
    /// read paths that need the timestamp for last-writer-wins comparisons.
    pub fn get_record(&self, key: &[u8]) -> Option<Record> {
        self.data.read().unwrap().get(key).cloned()
    }

    /// Put a key-value pair, stamped with the current time.
    /// Returns the memtable's total size after the write.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let record = Record::new(key, value, now_ts());
        self.set_record(record)
    }

    /// Delete a key (inserts a tombstone). Returns the total size after the write.
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let record = Record::tombstone(key, now_ts());
        self.set_record(record)
    }

    /// Insert a fully-formed record (used by WAL recovery to preserve the
    /// original timestamp/checksum instead of re-stamping on replay).
    pub fn set_record(&self, record: Record) -> usize {
        let added = record.total_size();
        let mut data = self.data.write().unwrap();
        let previous = data.insert(record.key.clone(), record);
        drop(data);

        if let Some(previous) = previous {
            self.size.fetch_sub(previous.total_size(), Ordering::SeqCst);
        }
        self.size.fetch_add(added, Ordering::SeqCst) + added
    }

    /// Total on-disk footprint (header + key + value) of all live entries,
    /// including tombstones.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Number of entries (tombstones count as entries).
    pub fn entry_count(&self) -> usize {
        self.data.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Whether this memtable has grown past `size_limit` and should be
    /// frozen and flushed.
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in ascending key order, for flush or inspection.
    pub fn iter(&self) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.data
            .read()
            .unwrap()
            .iter()
            .map(|(k, r)| (k.clone(), MemTableEntry::from(r)))
            .collect()
    }

    /// Snapshot of all records in ascending key order, for flush into an SSTable.
    pub fn iter_records(&self) -> Vec<Record> {
        self.data.read().unwrap().values().cloned().collect()
    }

    /// Clear all entries (after a successful flush).
    pub fn clear(&self) {
        self.data.write().unwrap().clear();
        self.size.store(0, Ordering::SeqCst);
    }

    /// Remove a key outright (no tombstone left behind). Used by cluster
    /// rebalance to relocate a record rather than delete it.
    pub fn remove(&self, key: &[u8]) -> Option<Record> {
        let removed = self.data.write().unwrap().remove(key);
        if let Some(r) = &removed {
            self.size.fetch_sub(r.total_size(), Ordering::SeqCst);
        }
        removed
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
