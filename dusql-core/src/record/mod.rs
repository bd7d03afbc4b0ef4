mod csv;

pub use csv::RecordWriter;

use std::fmt::Write as _;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DusqlError, Result};

/// File type mask of `st_mode`
pub const S_IFMT: u32 = 0o170000;
/// Directory file type
pub const S_IFDIR: u32 = 0o040000;

/// Identity of a filesystem entry: inode number scoped by device id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InodeKey {
    pub device: u64,
    pub inode: u64,
}

impl InodeKey {
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Stat `path` (following symlinks) and return its key
    pub fn of_path(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DusqlError::PathNotFound(path.to_path_buf()),
            _ => DusqlError::Io(e),
        })?;
        Ok(Self::new(meta.dev(), meta.ino()))
    }
}

/// One filesystem entry observed by a crawl
///
/// Stat-derived fields are `None` for entries that could be listed but not
/// stat-ed. `device` is the device of the directory holding the entry, so a
/// mount point carries its parent's device and its `(parent_inode, device)`
/// always resolves inside the same crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub inode: u64,
    pub device: u64,
    /// `None` only for scan roots
    pub parent_inode: Option<u64>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    /// Seconds since the epoch
    pub mtime: Option<f64>,
    /// Start of the crawl that produced this record; identifies the generation
    pub scan_time: f64,
    /// Raw entry name; the full scan path for scan roots
    pub basename: Vec<u8>,
    pub root_device: u64,
    /// Grandparent inode in the crawl ancestry chain
    pub ancestor_inode: Option<u64>,
}

impl InventoryRecord {
    /// Build a record from a successful stat
    pub fn from_metadata(
        meta: &Metadata,
        device: u64,
        parent_inode: Option<u64>,
        basename: Vec<u8>,
        scan_time: f64,
        root_device: u64,
        ancestor_inode: Option<u64>,
    ) -> Self {
        Self {
            inode: meta.ino(),
            device,
            parent_inode,
            mode: Some(meta.mode()),
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
            size: Some(meta.size()),
            mtime: Some(meta.mtime() as f64 + meta.mtime_nsec() as f64 / 1e9),
            scan_time,
            basename,
            root_device,
            ancestor_inode,
        }
    }

    /// Build the record of an entry that was listed but could not be stat-ed
    pub fn placeholder(
        inode: u64,
        device: u64,
        parent_inode: u64,
        basename: Vec<u8>,
        scan_time: f64,
        root_device: u64,
        ancestor_inode: Option<u64>,
    ) -> Self {
        Self {
            inode,
            device,
            parent_inode: Some(parent_inode),
            mode: None,
            uid: None,
            gid: None,
            size: None,
            mtime: None,
            scan_time,
            basename,
            root_device,
            ancestor_inode,
        }
    }

    pub fn key(&self) -> InodeKey {
        InodeKey::new(self.device, self.inode)
    }

    pub fn is_scan_root(&self) -> bool {
        self.parent_inode.is_none()
    }

    pub fn is_unreadable(&self) -> bool {
        self.mode.is_none()
    }

    pub fn is_directory(&self) -> bool {
        self.mode.is_some_and(|m| m & S_IFMT == S_IFDIR)
    }

    /// Entry name as text, see [`lossy_text`]
    pub fn display_name(&self) -> String {
        lossy_text(&self.basename)
    }
}

/// Decode bytes as UTF-8, replacing each undecodable byte with `\xNN`
///
/// Unlike `String::from_utf8_lossy` no information is lost, so two distinct
/// raw names never map to the same text.
pub fn lossy_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        for byte in chunk.invalid() {
            let _ = write!(out, "\\x{:02x}", byte);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lossy_text() {
        assert_eq!(lossy_text(b"plain.txt"), "plain.txt");
        assert_eq!(lossy_text("caf\u{e9}".as_bytes()), "caf\u{e9}");
        assert_eq!(lossy_text(b"bad\xffname"), "bad\\xffname");
        assert_eq!(lossy_text(b"\xc3"), "\\xc3");
    }

    #[test]
    fn test_placeholder_has_no_stat_fields() {
        let rec = InventoryRecord::placeholder(7, 1, 2, b"locked".to_vec(), 10.0, 1, None);
        assert!(rec.is_unreadable());
        assert!(!rec.is_directory());
        assert!(!rec.is_scan_root());
        assert_eq!(rec.size, None);
        assert_eq!(rec.mtime, None);
        assert_eq!(rec.uid, None);
        assert_eq!(rec.gid, None);
        assert_eq!(rec.key(), InodeKey::new(1, 7));
    }

    #[test]
    fn test_from_metadata_directory() {
        let temp = TempDir::new().unwrap();
        let meta = std::fs::symlink_metadata(temp.path()).unwrap();
        let rec = InventoryRecord::from_metadata(
            &meta,
            meta.dev(),
            None,
            b"/tmp/x".to_vec(),
            1.5,
            meta.dev(),
            None,
        );
        assert!(rec.is_directory());
        assert!(rec.is_scan_root());
        assert_eq!(rec.inode, meta.ino());
    }

    #[test]
    fn test_inode_key_of_missing_path() {
        let err = InodeKey::of_path(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, DusqlError::PathNotFound(_)));
    }
}
