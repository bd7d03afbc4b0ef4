use std::collections::HashMap;

use super::RecordStore;
use crate::Result;
use crate::record::{InodeKey, InventoryRecord};

/// Generation key: scan times are compared bit-for-bit
type Generation = u64;

fn generation(scan_time: f64) -> Generation {
    scan_time.to_bits()
}

/// In-process record store
///
/// Keeps every record in insertion order plus two indexes: by key and
/// generation, and by parent edge and generation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<InventoryRecord>,
    by_key: HashMap<(InodeKey, Generation), usize>,
    /// Newest generation per key
    latest: HashMap<InodeKey, usize>,
    /// (device, parent_inode, generation) -> child record indexes
    by_parent: HashMap<(u64, u64, Generation), Vec<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = InventoryRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.push(record);
        }
        store
    }

    fn push(&mut self, record: InventoryRecord) {
        let key = (record.key(), generation(record.scan_time));
        if self.by_key.contains_key(&key) {
            return;
        }

        let index = self.records.len();
        self.by_key.insert(key, index);
        let newer = match self.latest.get(&record.key()) {
            Some(&i) => self.records[i].scan_time < record.scan_time,
            None => true,
        };
        if newer {
            self.latest.insert(record.key(), index);
        }
        if let Some(parent) = record.parent_inode {
            self.by_parent
                .entry((record.device, parent, generation(record.scan_time)))
                .or_default()
                .push(index);
        }
        self.records.push(record);
    }
}

impl RecordStore for MemoryStore {
    fn lookup(&self, key: InodeKey) -> Result<Option<InventoryRecord>> {
        Ok(self.latest.get(&key).map(|&i| self.records[i].clone()))
    }

    fn record(&self, key: InodeKey, scan_time: f64) -> Result<Option<InventoryRecord>> {
        Ok(self
            .by_key
            .get(&(key, generation(scan_time)))
            .map(|&i| self.records[i].clone()))
    }

    fn children(&self, parent: &InventoryRecord) -> Result<Vec<InventoryRecord>> {
        let edge = (parent.device, parent.inode, generation(parent.scan_time));
        Ok(self
            .by_parent
            .get(&edge)
            .map(|indexes| indexes.iter().map(|&i| self.records[i].clone()).collect())
            .unwrap_or_default())
    }

    fn insert(&mut self, records: &[InventoryRecord]) -> Result<()> {
        for record in records {
            self.push(record.clone());
        }
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }
}
