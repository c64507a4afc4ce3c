//! Storage Module
//!
//! Persistent storage layer: immutable, sorted SSTables grouped into
//! size-tiered buckets, with bloom filters gating point lookups and
//! size-tiered compaction keeping the bucket count bounded.
//!
//! ## SSTable File Format
//!
//! Three files per table, named by a monotonic id:
//! - `sst_<id>.data`  — records (header + key + value), one after another.
//! - `sst_<id>.index` — sparse index, one entry per `sparse_sample` records.
//! - `sst_<id>.bloom` — one byte per bit, no header.
//!
//! See [`sstable`] for the per-table format, [`bucket`] for the size-tiered
//! grouping, and [`bucket_manager`] for compaction.

pub mod bucket;
pub mod bucket_manager;
pub mod sstable;

pub use bucket::Bucket;
pub use bucket_manager::BucketManager;
pub use sstable::{SSTable, SSTableBuilder, SSTableReader};


