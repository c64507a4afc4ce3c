//! SSTable Iterator
//!
//! Sequential iteration over every record in a table's data file, used by
//! compaction's k-way merge.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;
use crate::record::Record;

/// Iterator over records in a data file, in on-disk (ascending key) order.
pub struct SSTableIterator {
    buf: Vec<u8>,
    pos: usize,
}

impl SSTableIterator {
    pub(super) fn open(data_path: &Path) -> Result<Self> {
        let mut file = BufReader::new(File::open(data_path)?);
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Self { buf, pos: 0 })
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        match Record::decode(&self.buf[self.pos..]) {
            Ok((record, consumed)) => {
                self.pos += consumed;
                Some(Ok(record))
            }
            Err(e) => {
                self.pos = self.buf.len();
                Some(Err(e))
            }
        }
    }
}
