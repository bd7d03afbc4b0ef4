//! Persisted inventory records
//!
//! The query engine only needs three relational operations from a store:
//! resolve a key to its newest record, fetch a record of a given generation,
//! and list the children of a record within its own generation. Stores are
//! append-only; a re-crawl adds a new generation next to the old one.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use tracing::debug;

use crate::Result;
use crate::record::{InodeKey, InventoryRecord};

/// Records inserted per store transaction by [`load_records`]
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

pub trait RecordStore {
    /// Newest record for `key` across all generations
    fn lookup(&self, key: InodeKey) -> Result<Option<InventoryRecord>>;

    /// Record for `key` in the generation started at `scan_time`
    fn record(&self, key: InodeKey, scan_time: f64) -> Result<Option<InventoryRecord>>;

    /// Records whose parent is `parent`, from the parent's generation
    fn children(&self, parent: &InventoryRecord) -> Result<Vec<InventoryRecord>>;

    /// Append a batch of records. A record whose key already exists in the
    /// same generation (a second hard link) is ignored.
    fn insert(&mut self, records: &[InventoryRecord]) -> Result<()>;

    /// Number of stored records across all generations
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Parent record of `record`, `None` for scan roots
    fn parent(&self, record: &InventoryRecord) -> Result<Option<InventoryRecord>> {
        match record.parent_inode {
            Some(inode) => self.record(InodeKey::new(record.device, inode), record.scan_time),
            None => Ok(None),
        }
    }
}

/// Insert `records` into `store` in batches, returning how many were sent
pub fn load_records<S: RecordStore + ?Sized>(
    store: &mut S,
    records: impl IntoIterator<Item = InventoryRecord>,
    batch_size: usize,
) -> Result<u64> {
    let batch_size = batch_size.max(1);
    let mut pending = Vec::with_capacity(batch_size);
    let mut total = 0u64;

    for record in records {
        pending.push(record);
        if pending.len() >= batch_size {
            store.insert(&pending)?;
            total += pending.len() as u64;
            pending.clear();
        }
    }

    if !pending.is_empty() {
        store.insert(&pending)?;
        total += pending.len() as u64;
    }

    debug!(records = total, "loaded records into store");
    Ok(total)
}
