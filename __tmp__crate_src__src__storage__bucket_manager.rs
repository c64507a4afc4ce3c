//! Bucket manager
//!
//! Owns every on-disk SSTable, grouped into size-tiered [`Bucket`]s, and
//! drives compaction. Read path: newest table wins regardless of which
//! bucket it lives in, so lookups scan tables by descending id across all
//! buckets. Write path: a newly flushed or newly merged table is placed in
//! whichever bucket's size window accepts it, and a bucket that reaches
//! `min_compaction_threshold` tables is immediately compacted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::record::Record;

use super::bucket::Bucket;
use super::sstable::{bloom_path, data_path, index_path, SSTable, SSTableBuilder, SSTableReader};

/// Manages every bucket of SSTables for one [`crate::engine::Engine`].
pub struct BucketManager {
    dir: PathBuf,
    buckets: Vec<Bucket>,
    next_id: AtomicU64,
    sparse_sample: usize,
    bloom_fp_rate: f64,
    bucket_low: f32,
    bucket_high: f32,
    min_table_size: u64,
    min_compaction_threshold: usize,
    max_compaction_threshold: usize,
}

impl BucketManager {
    /// Open (or create) the storage directory, loading any existing tables
    /// back into a single bucket. Existing tables on disk are discovered by
    /// filename (`sst_<id>.data`) and their ids determine the next id to
    /// hand out.
    pub fn open(dir: &Path, config: &Config) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("sst_").and_then(|s| s.strip_suffix(".data")) {
                if let Ok(id) = rest.parse::<u64>() {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();

        let mut manager = Self {
            dir: dir.to_path_buf(),
            buckets: Vec::new(),
            next_id: AtomicU64::new(ids.last().map(|id| id + 1).unwrap_or(0)),
            sparse_sample: config.sparse_sample,
            bloom_fp_rate: config.bloom_fp_rate,
            bucket_low: config.bucket_low,
            bucket_high: config.bucket_high,
            min_table_size: config.min_table_size,
            min_compaction_threshold: config.min_compaction_threshold,
            max_compaction_threshold: config.max_compaction_threshold,
        };

        for id in ids {
            // The true entry count is only known after a full scan of the
            // data file (which `open` already performs to find the max key),
            // so the bloom filter is rebuilt here sized off a rough guess —
            // harmless, since bloom sizing only affects false-positive rate,
            // never correctness.
            let reader = SSTableReader::open(dir, id, config.bloom_fp_rate)?;
            let table = reader.metadata().clone();
            manager.insert_existing(table, reader);
        }

        Ok(manager)
    }

    fn insert_existing(&mut self, table: SSTable, reader: SSTableReader) {
        let bucket = self.bucket_for_size(table.total_size);
        self.buckets[bucket].push(table, reader);
    }

    fn bucket_for_size(&mut self, size: u64) -> usize {
        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.accepts(size, self.bucket_low, self.bucket_high, self.min_table_size) {
                return i;
            }
        }
        self.buckets.push(Bucket::new());
        self.buckets.len() - 1
    }

    /// Look up a key across every table. Last-writer-wins: ties between
    /// records with the same timestamp are broken by the higher table id
    /// (the more recently written table).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut best: Option<(u64, Record)> = None;

        for bucket in &self.buckets {
            for (table, reader) in &bucket.tables {
                if !reader.might_contain_range(key) {
                    continue;
                }
                if let Some(record) = reader.get_record(key)? {
                    let is_newer = match &best {
                        None => true,
                        Some((best_id, best_record)) => {
                            (record.header.timestamp, table.id)
                                > (best_record.header.timestamp, *best_id)
                        }
                    };
                    if is_newer {
                        best = Some((table.id, record));
                    }
                }
            }
        }

        Ok(best.and_then(|(_, r)| if r.is_tombstone() { None } else { Some(r.value) }))
    }

    /// Flush a memtable's contents into a brand new SSTable.
    pub fn flush(&mut self, memtable: &MemTable) -> Result<SSTable> {
        let records = memtable.iter_records();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut builder = SSTableBuilder::new(
            &self.dir,
            id,
            records.len().max(1),
            self.sparse_sample,
            self.bloom_fp_rate,
        )?;
        for record in &records {
            builder.add(record)?;
        }
        let table = builder.finish()?;
        info!(id, entries = table.entry_count, "flushed memtable to sstable");

        let reader = SSTableReader::open(&self.dir, id, self.bloom_fp_rate)?;
        self.insert_table(table.clone(), reader)?;
        Ok(table)
    }

    /// Insert a table into the appropriate bucket, triggering compaction if
    /// that bucket has grown past its threshold. May recurse, since a
    /// compaction's merged output is itself inserted back through this path.
    fn insert_table(&mut self, table: SSTable, reader: SSTableReader) -> Result<()> {
        let bucket_idx = self.bucket_for_size(table.total_size);
        self.buckets[bucket_idx].push(table, reader);

        if self.buckets[bucket_idx].should_compact(self.min_compaction_threshold) {
            self.compact_bucket(bucket_idx)?;
        }
        Ok(())
    }

    fn compact_bucket(&mut self, bucket_idx: usize) -> Result<()> {
        let new_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let max_threshold = self.max_compaction_threshold;
        let sparse_sample = self.sparse_sample;
        let bloom_fp_rate = self.bloom_fp_rate;
        let dir = self.dir.clone();

        // Lower levels = buckets after this one (larger/older tiers).
        let lower_snapshot: Vec<SSTable> = self.buckets[bucket_idx + 1..]
            .iter()
            .flat_map(|b| b.tables.iter().map(|(t, _)| t.clone()))
            .collect();

        let (merged, consumed_ids) = {
            let bucket = &mut self.buckets[bucket_idx];
            bucket.compact(&dir, new_id, sparse_sample, bloom_fp_rate, max_threshold, |key| {
                lower_snapshot.iter().any(|t| t.might_contain_range(key))
            })?
        };

        for id in &consumed_ids {
            let _ = fs::remove_file(data_path(&dir, *id));
            let _ = fs::remove_file(index_path(&dir, *id));
            let _ = fs::remove_file(bloom_path(&dir, *id));
        }

        debug!(
            bucket = bucket_idx,
            merged_from = consumed_ids.len(),
            new_id,
            "compacted bucket"
        );

        let reader = SSTableReader::open(&dir, new_id, bloom_fp_rate)?;
        self.insert_table(merged, reader)
    }

    pub fn sstable_count(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}


