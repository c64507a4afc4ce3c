//! Configuration for RidgeKV
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

/// Main configuration for RidgeKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory for all data files
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// WAL file path (relative to data_dir)
    pub wal_path: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable / Flush Configuration
    // -------------------------------------------------------------------------
    /// Byte size above which a memtable is frozen and flushed
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // SSTable Configuration
    // -------------------------------------------------------------------------
    /// Every Nth record gets a sparse index entry
    pub sparse_sample: usize,

    /// Target bloom filter false positive probability
    pub bloom_fp_rate: f64,

    // -------------------------------------------------------------------------
    // Bucket / Compaction Configuration
    // -------------------------------------------------------------------------
    /// A table below this size is always accepted by an empty bucket
    pub min_table_size: u64,

    /// Lower size-skew ratio accepted by a non-empty bucket
    pub bucket_low: f32,

    /// Upper size-skew ratio accepted by a non-empty bucket
    pub bucket_high: f32,

    /// Minimum table count that triggers compaction of a bucket
    pub min_compaction_threshold: usize,

    /// Maximum table count considered in one compaction pass
    pub max_compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Ring / Cluster Configuration
    // -------------------------------------------------------------------------
    /// Virtual points placed on the consistent-hash ring per node
    pub virtual_nodes_per_node: usize,

    /// Deadline for a single migration RPC during rebalance
    pub migration_deadline_ms: u64,

    /// Maximum number of retries for a failed migration RPC
    pub migration_max_retries: u32,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./ridgekv_data"),
            wal_path: PathBuf::from("wal.log"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 256 * 1024 * 1024, // 256 MiB, per FlushThreshold default
            sparse_sample: 100,
            bloom_fp_rate: 0.01,
            min_table_size: 3 * 1024,
            bucket_low: 0.5,
            bucket_high: 1.5,
            min_compaction_threshold: 4,
            max_compaction_threshold: 12,
            virtual_nodes_per_node: 160,
            migration_deadline_ms: 5_000,
            migration_max_retries: 3,
            listen_addr: "127.0.0.1:6379".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn wal_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.wal_path = path.as_ref().to_path_buf();
        self
    }

    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    pub fn memtable_size_limit(mut self, limit: usize) -> Self {
        self.config.memtable_size_limit = limit;
        self
    }

    pub fn sparse_sample(mut self, n: usize) -> Self {
        self.config.sparse_sample = n.max(1);
        self
    }

    pub fn bloom_fp_rate(mut self, p: f64) -> Self {
        self.config.bloom_fp_rate = p;
        self
    }

    pub fn min_table_size(mut self, size: u64) -> Self {
        self.config.min_table_size = size;
        self
    }

    pub fn bucket_thresholds(mut self, low: f32, high: f32) -> Self {
        self.config.bucket_low = low;
        self.config.bucket_high = high;
        self
    }

    pub fn compaction_thresholds(mut self, min: usize, max: usize) -> Self {
        self.config.min_compaction_threshold = min;
        self.config.max_compaction_threshold = max;
        self
    }

    pub fn virtual_nodes_per_node(mut self, n: usize) -> Self {
        self.config.virtual_nodes_per_node = n;
        self
    }

    pub fn migration_deadline_ms(mut self, ms: u64) -> Self {
        self.config.migration_deadline_ms = ms;
        self
    }

    pub fn migration_max_retries(mut self, n: u32) -> Self {
        self.config.migration_max_retries = n;
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, n: usize) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
