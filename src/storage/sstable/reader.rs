//! SSTable Reader
//!
//! Opens a table's three files and answers point lookups: bloom filter
//! first, then a binary search over the sparse index followed by a short
//! linear scan of the data file.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::bloom::BloomFilter;
use crate::error::Result;
use crate::record::Record;

use super::iterator::SSTableIterator;
use super::{bloom_path, data_path, index_path, SSTable};

/// Reader for an open SSTable, with its sparse index and bloom filter
/// resident in memory.
pub struct SSTableReader {
    data_path: std::path::PathBuf,
    /// (key, offset) pairs, one per `sparse_sample` records, ascending by key.
    index: Vec<(Vec<u8>, u32)>,
    bloom: BloomFilter,
    table: SSTable,
}

impl SSTableReader {
    /// Open a table given its directory and id. `bloom_fp_rate` must match
    /// whatever rate the table was built with, so the reloaded filter's hash
    /// count agrees with the one used when the bits were set.
    pub fn open(dir: &Path, id: u64, bloom_fp_rate: f64) -> Result<Self> {
        let data_file_path = data_path(dir, id);

        let mut index = Vec::new();
        let mut index_file = File::open(index_path(dir, id))?;
        let mut buf = Vec::new();
        index_file.read_to_end(&mut buf)?;
        let mut pos = 0;
        while pos + 4 <= buf.len() {
            let key_len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;
            if pos + key_len + 4 > buf.len() {
                break;
            }
            let key = buf[pos..pos + key_len].to_vec();
            pos += key_len;
            let offset = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
            pos += 4;
            index.push((key, offset));
        }

        // Scan the data file first: the exact entry count it yields is what
        // the bloom filter needs to recompute the same hash count `k` it was
        // built with (the `.bloom` file stores only raw bits, no header).
        let min_key = index.first().map(|(k, _)| k.clone()).unwrap_or_default();
        let (max_key, entry_count) = Self::scan_data_file(&data_file_path)?;
        let total_size = std::fs::metadata(&data_file_path)?.len();

        let mut bloom_file = File::open(bloom_path(dir, id))?;
        let bloom =
            BloomFilter::read_from(&mut bloom_file, entry_count.max(1) as usize, bloom_fp_rate)?;

        Ok(Self {
            data_path: data_file_path,
            index,
            bloom,
            table: SSTable {
                id,
                entry_count,
                min_key,
                max_key: max_key.unwrap_or_default(),
                total_size,
            },
        })
    }

    /// A full scan of the data file, needed once at open time to recover the
    /// exact entry count and max key (neither is persisted separately — the
    /// sparse index only samples every Nth key).
    fn scan_data_file(data_path: &Path) -> Result<(Option<Vec<u8>>, u64)> {
        let mut file = BufReader::new(File::open(data_path)?);
        let mut last_key = None;
        let mut count = 0u64;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let mut pos = 0;
        while pos < buf.len() {
            let (record, consumed) = Record::decode(&buf[pos..])?;
            last_key = Some(record.key);
            count += 1;
            pos += consumed;
        }
        Ok((last_key, count))
    }

    pub fn metadata(&self) -> &SSTable {
        &self.table
    }

    /// Quick range check against this table's key span.
    pub fn might_contain_range(&self, key: &[u8]) -> bool {
        self.table.might_contain_range(key)
    }

    /// Look up the full record for `key`, including tombstones. `Ok(None)`
    /// means the key is not present in this table at all (distinct from a
    /// tombstone, which is `Ok(Some(record))` with `record.is_tombstone()`).
    pub fn get_record(&self, key: &[u8]) -> Result<Option<Record>> {
        if !self.bloom.might_contain(key) {
            return Ok(None);
        }
        if !self.might_contain_range(key) {
            return Ok(None);
        }

        // Binary search the sparse index for the last entry <= key.
        let start_offset = match self.index.partition_point(|(k, _)| k.as_slice() <= key) {
            0 => 0,
            n => self.index[n - 1].1,
        };

        let mut file = BufReader::new(File::open(&self.data_path)?);
        file.seek(SeekFrom::Start(start_offset as u64))?;

        let mut remaining = Vec::new();
        file.read_to_end(&mut remaining)?;

        let mut pos = 0;
        while pos < remaining.len() {
            let (record, consumed) = Record::decode(&remaining[pos..])?;
            match record.key.as_slice().cmp(key) {
                std::cmp::Ordering::Equal => return Ok(Some(record)),
                std::cmp::Ordering::Greater => return Ok(None),
                std::cmp::Ordering::Less => pos += consumed,
            }
        }
        Ok(None)
    }

    /// Convenience lookup returning `None` for both "not found" and
    /// "tombstone" — callers needing to distinguish use [`get_record`].
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.get_record(key)?.and_then(|r| {
            if r.is_tombstone() {
                None
            } else {
                Some(r.value)
            }
        }))
    }

    /// Full sequential scan of every record in this table, in key order.
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.data_path)
    }
}
