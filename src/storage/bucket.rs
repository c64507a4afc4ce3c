//! Size-tiered bucket
//!
//! A bucket groups SSTables of roughly similar size. The bucket manager
//! decides which bucket a freshly flushed or freshly compacted table lands
//! in; once a bucket accumulates enough tables it is compacted down to one.

use std::collections::BinaryHeap;
use std::path::Path;

use crate::error::Result;
use crate::record::Record;
use crate::storage::sstable::{SSTable, SSTableBuilder, SSTableReader};

/// One size tier: a set of open table readers plus their metadata.
pub struct Bucket {
    pub tables: Vec<(SSTable, SSTableReader)>,
}

/// Result of comparing a candidate table's size against a bucket's current
/// acceptance window, per spec.md §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Smaller than this bucket's window: belongs at a lower level.
    TooSmall,
    /// Within this bucket's window: insert here.
    Fits,
    /// Larger than this bucket's window: belongs at a higher level.
    TooLarge,
}

impl Bucket {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Average data-file size of tables currently in this bucket.
    pub fn average_size(&self) -> u64 {
        if self.tables.is_empty() {
            return 0;
        }
        let total: u64 = self.tables.iter().map(|(t, _)| t.total_size).sum();
        total / self.tables.len() as u64
    }

    /// Whether a table of `size` belongs in this bucket, per the size-tiered
    /// acceptance window `[average * bucket_low, average * bucket_high]`.
    /// An empty bucket, or one whose tables are all below `min_table_size`,
    /// accepts any table below `min_table_size`.
    pub fn accepts(&self, size: u64, bucket_low: f32, bucket_high: f32, min_table_size: u64) -> bool {
        matches!(
            self.classify(size, bucket_low, bucket_high, min_table_size),
            Classification::Fits
        )
    }

    /// Classify `size` against this bucket's acceptance window, per
    /// spec.md §4.8's `classify(bucket, t) ∈ {-1, 0, +1}`. An empty bucket,
    /// or one whose tables are all below `min_table_size`, fits any table
    /// below `min_table_size`.
    pub fn classify(
        &self,
        size: u64,
        bucket_low: f32,
        bucket_high: f32,
        min_table_size: u64,
    ) -> Classification {
        if self.is_empty() {
            return Classification::Fits;
        }
        let avg = self.average_size();
        if avg < min_table_size && size < min_table_size {
            return Classification::Fits;
        }
        let low = (avg as f64 * bucket_low as f64) as u64;
        let high = (avg as f64 * bucket_high as f64) as u64;
        if size < low {
            Classification::TooSmall
        } else if size > high {
            Classification::TooLarge
        } else {
            Classification::Fits
        }
    }

    pub fn should_compact(&self, min_threshold: usize) -> bool {
        self.len() >= min_threshold
    }

    pub fn push(&mut self, table: SSTable, reader: SSTableReader) {
        self.tables.push((table, reader));
    }

    /// Merge up to `max_threshold` of this bucket's tables (oldest first, by
    /// insertion order) into a single new table, via a k-way merge that keeps
    /// the newest record per key (highest timestamp) and drops a tombstone
    /// only when `key_survives_below` reports no older generation still
    /// holds that key.
    ///
    /// Returns the merged table's metadata and the ids of the source tables
    /// that were consumed, so the caller (bucket manager) can delete their
    /// files and re-insert the merged result — this bucket never calls back
    /// into the manager itself.
    pub fn compact<F>(
        &mut self,
        dir: &Path,
        new_id: u64,
        sparse_sample: usize,
        bloom_fp_rate: f64,
        max_threshold: usize,
        key_survives_below: F,
    ) -> Result<(SSTable, Vec<u64>)>
    where
        F: Fn(&[u8]) -> bool,
    {
        let take = max_threshold.min(self.tables.len());
        let merged_ids: Vec<u64> = self.tables[..take].iter().map(|(t, _)| t.id).collect();

        let expected_entries: usize = self.tables[..take]
            .iter()
            .map(|(t, _)| t.entry_count as usize)
            .sum();

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        let mut iters: Vec<_> = self.tables[..take]
            .iter()
            .map(|(_, r)| r.iter())
            .collect::<Result<Vec<_>>>()?;

        for (idx, it) in iters.iter_mut().enumerate() {
            if let Some(record) = it.next() {
                heap.push(HeapEntry {
                    record: record?,
                    source: idx,
                });
            }
        }

        let mut builder =
            SSTableBuilder::new(dir, new_id, expected_entries.max(1), sparse_sample, bloom_fp_rate)?;

        let mut pending: Option<Record> = None;
        while let Some(HeapEntry { record, source }) = heap.pop() {
            if let Some(next) = iters[source].next() {
                heap.push(HeapEntry {
                    record: next?,
                    source,
                });
            }

            match &pending {
                Some(p) if p.key == record.key => {
                    if record.header.timestamp >= p.header.timestamp {
                        pending = Some(record);
                    }
                }
                Some(_) => {
                    let finished = pending.replace(record).unwrap();
                    Self::emit(&mut builder, finished, &key_survives_below)?;
                }
                None => {
                    pending = Some(record);
                }
            }
        }
        if let Some(last) = pending {
            Self::emit(&mut builder, last, &key_survives_below)?;
        }

        let merged = builder.finish()?;
        self.tables.retain(|(t, _)| !merged_ids.contains(&t.id));
        Ok((merged, merged_ids))
    }

    fn emit<F: Fn(&[u8]) -> bool>(
        builder: &mut SSTableBuilder,
        record: Record,
        key_survives_below: &F,
    ) -> Result<()> {
        if record.is_tombstone() && !key_survives_below(&record.key) {
            return Ok(());
        }
        builder.add(&record)
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::new()
    }
}

struct HeapEntry {
    record: Record,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record.key == other.record.key
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest key pops first.
        other.record.key.cmp(&self.record.key)
    }
}
