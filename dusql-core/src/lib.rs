pub mod error;
pub mod human;
pub mod query;
pub mod record;
pub mod scanner;
pub mod size;
pub mod store;

pub use error::{DusqlError, Result};
pub use human::{HumanPredicate, parse_mtime, resolve_group, resolve_user};
pub use query::{Descendant, DuSummary, FindRequest, Predicate, QueryConfig, QueryEngine};
pub use record::{InodeKey, InventoryRecord, RecordWriter, lossy_text};
pub use scanner::{Crawler, ScanConfig, ScanMessage, ScanProgress, entry_inode, scan_roots};
pub use size::{format_count, format_size, parse_size, size_percentage};
pub use store::{MemoryStore, RecordStore, SqliteStore, load_records};
