//! Tests for BucketManager
//!
//! These tests verify:
//! - Opening/creating storage directories
//! - Flushing MemTable to SSTable
//! - Querying across multiple SSTables
//! - Tombstone handling across SSTables
//! - Persistence (restart and rediscover SSTables)
//! - Size-tiered compaction triggering

use std::path::PathBuf;
use ridgekv::config::Config;
use ridgekv::memtable::MemTable;
use ridgekv::storage::BucketManager;
use tempfile::TempDir;

fn setup_temp_storage() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn create_memtable_with_entries(entries: &[(&[u8], &[u8])]) -> MemTable {
    let memtable = MemTable::new();
    for (key, value) in entries {
        memtable.put(key.to_vec(), value.to_vec());
    }
    memtable
}

// =============================================================================
// Open/Create Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("new_storage");
    let config = Config::default();

    assert!(!path.exists());
    let _manager = BucketManager::open(&path, &config).unwrap();
    assert!(path.exists());
    assert!(path.is_dir());
}

#[test]
fn test_open_empty_directory() {
    let (_temp, path) = setup_temp_storage();
    let manager = BucketManager::open(&path, &Config::default()).unwrap();
    assert_eq!(manager.sstable_count(), 0);
}

#[test]
fn test_open_existing_directory_rediscovers_tables() {
    let (_temp, path) = setup_temp_storage();
    let config = Config::default();

    {
        let mut manager = BucketManager::open(&path, &config).unwrap();
        manager
            .flush(&create_memtable_with_entries(&[(b"k1", b"v1")]))
            .unwrap();
        manager
            .flush(&create_memtable_with_entries(&[(b"k2", b"v2")]))
            .unwrap();
        assert_eq!(manager.sstable_count(), 2);
    }

    {
        let manager = BucketManager::open(&path, &config).unwrap();
        assert_eq!(manager.sstable_count(), 2);
        assert_eq!(manager.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(manager.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    }
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_single_memtable() {
    let (_temp, path) = setup_temp_storage();
    let mut manager = BucketManager::open(&path, &Config::default()).unwrap();

    let memtable = create_memtable_with_entries(&[
        (b"apple", b"red"),
        (b"banana", b"yellow"),
        (b"cherry", b"red"),
    ]);

    let table = manager.flush(&memtable).unwrap();

    assert_eq!(table.entry_count, 3);
    assert_eq!(manager.sstable_count(), 1);
}

#[test]
fn test_flush_multiple_memtables() {
    let (_temp, path) = setup_temp_storage();
    let mut config = Config::default();
    config.min_compaction_threshold = 100; // avoid triggering compaction in this test
    let mut manager = BucketManager::open(&path, &config).unwrap();

    for i in 0..3 {
        let key = format!("key{i}");
        let value = format!("value{i}");
        manager
            .flush(&create_memtable_with_entries(&[(key.as_bytes(), value.as_bytes())]))
            .unwrap();
    }

    assert_eq!(manager.sstable_count(), 3);
}

#[test]
fn test_flush_with_tombstones() {
    let (_temp, path) = setup_temp_storage();
    let mut manager = BucketManager::open(&path, &Config::default()).unwrap();

    let memtable = MemTable::new();
    memtable.put(b"key1".to_vec(), b"value1".to_vec());
    memtable.delete(b"key2".to_vec());
    memtable.put(b"key3".to_vec(), b"value3".to_vec());

    let table = manager.flush(&memtable).unwrap();
    assert_eq!(table.entry_count, 3);
}

// =============================================================================
// Get Tests
// =============================================================================

#[test]
fn test_get_from_single_sstable() {
    let (_temp, path) = setup_temp_storage();
    let mut manager = BucketManager::open(&path, &Config::default()).unwrap();

    manager
        .flush(&create_memtable_with_entries(&[(b"key1", b"value1"), (b"key2", b"value2")]))
        .unwrap();

    assert_eq!(manager.get(b"key1").unwrap(), Some(b"value1".to_vec()));
    assert_eq!(manager.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    assert_eq!(manager.get(b"key3").unwrap(), None);
}

#[test]
fn test_get_from_multiple_sstables() {
    let (_temp, path) = setup_temp_storage();
    let mut config = Config::default();
    config.min_compaction_threshold = 100;
    let mut manager = BucketManager::open(&path, &config).unwrap();

    manager
        .flush(&create_memtable_with_entries(&[(b"k1", b"v1"), (b"k2", b"v2")]))
        .unwrap();
    manager
        .flush(&create_memtable_with_entries(&[(b"k3", b"v3"), (b"k4", b"v4")]))
        .unwrap();

    assert_eq!(manager.get(b"k1").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(manager.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(manager.get(b"k3").unwrap(), Some(b"v3".to_vec()));
    assert_eq!(manager.get(b"k4").unwrap(), Some(b"v4".to_vec()));
}

#[test]
fn test_get_newer_overrides_older() {
    let (_temp, path) = setup_temp_storage();
    let mut config = Config::default();
    config.min_compaction_threshold = 100;
    let mut manager = BucketManager::open(&path, &config).unwrap();

    manager.flush(&create_memtable_with_entries(&[(b"key", b"old")])).unwrap();
    manager.flush(&create_memtable_with_entries(&[(b"key", b"new")])).unwrap();

    assert_eq!(manager.get(b"key").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn test_get_tombstone_hides_older_value() {
    let (_temp, path) = setup_temp_storage();
    let mut config = Config::default();
    config.min_compaction_threshold = 100;
    let mut manager = BucketManager::open(&path, &config).unwrap();

    manager.flush(&create_memtable_with_entries(&[(b"key", b"value")])).unwrap();

    let memtable = MemTable::new();
    memtable.delete(b"key".to_vec());
    manager.flush(&memtable).unwrap();

    assert_eq!(manager.get(b"key").unwrap(), None);
}

#[test]
fn test_get_not_found() {
    let (_temp, path) = setup_temp_storage();
    let mut manager = BucketManager::open(&path, &Config::default()).unwrap();

    manager.flush(&create_memtable_with_entries(&[(b"exists", b"value")])).unwrap();
    assert_eq!(manager.get(b"not_exists").unwrap(), None);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_persistence_across_restart() {
    let (_temp, path) = setup_temp_storage();
    let config = Config::default();

    {
        let mut manager = BucketManager::open(&path, &config).unwrap();
        manager
            .flush(&create_memtable_with_entries(&[(b"key1", b"value1"), (b"key2", b"value2")]))
            .unwrap();
    }

    {
        let manager = BucketManager::open(&path, &config).unwrap();
        assert_eq!(manager.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(manager.get(b"key2").unwrap(), Some(b"value2".to_vec()));
    }
}

#[test]
fn test_persistence_multiple_sstables() {
    let (_temp, path) = setup_temp_storage();
    let mut config = Config::default();
    config.min_compaction_threshold = 100;

    {
        let mut manager = BucketManager::open(&path, &config).unwrap();
        for i in 0..5 {
            let key = format!("key{i}");
            let value = format!("value{i}");
            manager
                .flush(&create_memtable_with_entries(&[(key.as_bytes(), value.as_bytes())]))
                .unwrap();
        }
    }

    {
        let manager = BucketManager::open(&path, &config).unwrap();
        assert_eq!(manager.sstable_count(), 5);
        for i in 0..5 {
            let key = format!("key{i}");
            let expected = format!("value{i}");
            assert_eq!(manager.get(key.as_bytes()).unwrap(), Some(expected.into_bytes()));
        }
    }
}

// =============================================================================
// Compaction
// =============================================================================

#[test]
fn test_compaction_triggers_and_preserves_gets() {
    let (_temp, path) = setup_temp_storage();
    let mut config = Config::default();
    config.min_compaction_threshold = 4;
    config.max_compaction_threshold = 12;
    let mut manager = BucketManager::open(&path, &config).unwrap();

    // Flush enough small tables to cross the compaction threshold.
    for i in 0..6 {
        let key = format!("key{i}");
        let value = format!("value{i}");
        manager
            .flush(&create_memtable_with_entries(&[(key.as_bytes(), value.as_bytes())]))
            .unwrap();
    }

    // Compaction should have collapsed tables below the flushed count.
    assert!(manager.sstable_count() < 6);

    for i in 0..6 {
        let key = format!("key{i}");
        let expected = format!("value{i}");
        assert_eq!(manager.get(key.as_bytes()).unwrap(), Some(expected.into_bytes()));
    }
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_large_flush() {
    let (_temp, path) = setup_temp_storage();
    let mut manager = BucketManager::open(&path, &Config::default()).unwrap();

    let memtable = MemTable::new();
    for i in 0..1000 {
        let key = format!("key{i:04}");
        let value = format!("value{i}");
        memtable.put(key.into_bytes(), value.into_bytes());
    }

    let table = manager.flush(&memtable).unwrap();
    assert_eq!(table.entry_count, 1000);

    assert_eq!(manager.get(b"key0500").unwrap(), Some(b"value500".to_vec()));
}

#[test]
fn test_ignores_non_sstable_files() {
    let (_temp, path) = setup_temp_storage();
    let config = Config::default();

    {
        let mut manager = BucketManager::open(&path, &config).unwrap();
        manager.flush(&create_memtable_with_entries(&[(b"k", b"v")])).unwrap();
    }

    std::fs::write(path.join("random.txt"), b"not an sstable").unwrap();
    std::fs::write(path.join("sst_abc.data"), b"bad id").unwrap();
    std::fs::write(path.join("other_000001.data"), b"wrong prefix").unwrap();

    {
        let manager = BucketManager::open(&path, &config).unwrap();
        assert_eq!(manager.sstable_count(), 1);
    }
}
