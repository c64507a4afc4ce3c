//! SSTable Builder
//!
//! Writes sorted records to a new, immutable on-disk table: a data file, a
//! sparse index, and a bloom filter. Every file is written to a temporary
//! name and renamed into place after an `fsync`, so a crash mid-build never
//! leaves a half-written table visible under its real name.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bloom::BloomFilter;
use crate::error::Result;
use crate::record::Record;

use super::{bloom_path, data_path, index_path, SSTable};

/// Builder for creating new SSTables from sorted records.
pub struct SSTableBuilder {
    dir: PathBuf,
    id: u64,
    sparse_sample: usize,

    data_tmp_path: PathBuf,
    data_writer: BufWriter<File>,

    entry_count: u64,
    current_offset: u64,
    index: Vec<(Vec<u8>, u32)>,
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    bloom: BloomFilter,
}

impl SSTableBuilder {
    /// Create a builder for a new table `id` in `dir`.
    ///
    /// `expected_entries` sizes the bloom filter; it need only be
    /// approximately right (the caller's memtable/bucket entry count).
    pub fn new(
        dir: &Path,
        id: u64,
        expected_entries: usize,
        sparse_sample: usize,
        bloom_fp_rate: f64,
    ) -> Result<Self> {
        let data_tmp_path = data_path(dir, id).with_extension("data.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&data_tmp_path)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            id,
            sparse_sample: sparse_sample.max(1),
            data_tmp_path,
            data_writer: BufWriter::new(file),
            entry_count: 0,
            current_offset: 0,
            index: Vec::new(),
            min_key: None,
            max_key: None,
            bloom: BloomFilter::new(expected_entries.max(1), bloom_fp_rate),
        })
    }

    /// Append a record. Must be called in ascending key order.
    pub fn add(&mut self, record: &Record) -> Result<()> {
        if self.entry_count as usize % self.sparse_sample == 0 {
            self.index
                .push((record.key.clone(), self.current_offset as u32));
        }

        if self.min_key.is_none() {
            self.min_key = Some(record.key.clone());
        }
        self.max_key = Some(record.key.clone());

        self.bloom.add(&record.key);

        let bytes = record.encode();
        self.data_writer.write_all(&bytes)?;
        self.current_offset += bytes.len() as u64;
        self.entry_count += 1;

        Ok(())
    }

    /// Finish building: fsync and rename the data file, write the index and
    /// bloom filter, and return the table's metadata.
    pub fn finish(mut self) -> Result<SSTable> {
        self.data_writer.flush()?;
        let file = self.data_writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        let final_data_path = data_path(&self.dir, self.id);
        fs::rename(&self.data_tmp_path, &final_data_path)?;
        let total_size = fs::metadata(&final_data_path)?.len();

        self.write_index()?;
        self.write_bloom()?;

        Ok(SSTable {
            id: self.id,
            entry_count: self.entry_count,
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.max_key.unwrap_or_default(),
            total_size,
        })
    }

    fn write_index(&self) -> Result<()> {
        let final_path = index_path(&self.dir, self.id);
        let tmp_path = final_path.with_extension("index.tmp");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        for (key, offset) in &self.index {
            writer.write_all(&(key.len() as u32).to_le_bytes())?;
            writer.write_all(key)?;
            writer.write_all(&offset.to_le_bytes())?;
        }
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    fn write_bloom(&self) -> Result<()> {
        let final_path = bloom_path(&self.dir, self.id);
        let tmp_path = final_path.with_extension("bloom.tmp");

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        self.bloom.write_to(&mut writer)?;
        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}


