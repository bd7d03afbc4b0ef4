use std::path::PathBuf;

use crate::record::InventoryRecord;

/// Message sent from a crawl thread to the consumer
#[derive(Debug, Clone)]
pub enum ScanMessage {
    /// One inventory record
    Record(InventoryRecord),
    /// A root has been fully crawled
    Completed { root: PathBuf, progress: ScanProgress },
    /// A root did not exist or could not be stat-ed; nothing was recorded
    Missing(PathBuf),
}

/// Crawl statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// Records emitted, including the scan root
    pub records: u64,
    /// Directories descended into
    pub dirs_scanned: u64,
    /// Sum of `size` over emitted records
    pub bytes_scanned: u64,
    /// Placeholder records for entries that could not be stat-ed
    pub unreadable: u64,
    /// Entries that disappeared between listing and stat
    pub vanished: u64,
    /// Directories whose listing failed
    pub unlistable: u64,
    /// Directories not descended because they sit on another device
    pub boundaries: u64,
}

impl ScanProgress {
    pub fn errors(&self) -> u64 {
        self.unreadable + self.unlistable
    }
}
