mod progress;
mod walker;

pub use progress::{ScanMessage, ScanProgress};
pub use walker::{Crawler, ScanConfig, entry_inode, scan_roots};
