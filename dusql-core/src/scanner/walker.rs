use std::fs::{self, Metadata, ReadDir};
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::os::unix::fs::{DirEntryExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::SystemTime;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use super::progress::{ScanMessage, ScanProgress};
use crate::record::{InodeKey, InventoryRecord};

/// Crawler configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Refuse to descend into a directory that already appears in its own
    /// ancestry chain
    pub guard_ancestry: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            guard_ancestry: true,
        }
    }
}

/// Outcome of the non-following stat of a listed entry
enum EntryStat {
    Stat(Metadata),
    Unreadable(io::Error),
    Vanished,
}

fn classify(result: io::Result<Metadata>) -> EntryStat {
    match result {
        Ok(meta) => EntryStat::Stat(meta),
        Err(e) if e.kind() == io::ErrorKind::NotFound => EntryStat::Vanished,
        Err(e) => EntryStat::Unreadable(e),
    }
}

/// Inode under which a listed entry is stored
///
/// An entry on another device than its directory is a mount point. Its own
/// `st_ino` belongs to the mounted filesystem and may equal a real inode of
/// the parent device, so the directory entry's inode (the covered directory)
/// is used instead.
pub fn entry_inode(meta: &Metadata, parent_device: u64, listed_inode: u64) -> u64 {
    if meta.dev() == parent_device {
        meta.ino()
    } else {
        listed_inode
    }
}

/// A directory currently being listed
struct Frame {
    entries: ReadDir,
    device: u64,
    inode: u64,
    parent_inode: Option<u64>,
    /// The directory's own record, emitted once its listing is exhausted.
    /// `None` for the scan root, which is emitted up front.
    record: Option<InventoryRecord>,
}

/// Lazy depth-first crawl of one scan root
///
/// Yields one [`InventoryRecord`] per entry. Directories are held open on an
/// explicit stack, so depth is bounded by the tree and not the call stack.
pub struct Crawler {
    config: ScanConfig,
    root: PathBuf,
    root_key: Option<InodeKey>,
    scan_time: f64,
    pending_root: Option<InventoryRecord>,
    stack: Vec<Frame>,
    progress: ScanProgress,
}

impl Crawler {
    /// Stat `root` and prepare the crawl
    ///
    /// A root that cannot be stat-ed yields an empty sequence.
    pub fn new(root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        let root = root.into();
        let scan_time = now_seconds();

        let mut crawler = Self {
            config,
            root: root.clone(),
            root_key: None,
            scan_time,
            pending_root: None,
            stack: Vec::new(),
            progress: ScanProgress::default(),
        };

        let meta = match fs::metadata(&root) {
            Ok(m) => m,
            Err(e) => {
                if e.kind() == io::ErrorKind::NotFound {
                    debug!(root = %root.display(), "scan root does not exist");
                } else {
                    warn!(root = %root.display(), error = %e, "cannot stat scan root");
                }
                return crawler;
            }
        };

        let device = meta.dev();
        let record = InventoryRecord::from_metadata(
            &meta,
            device,
            None,
            root.clone().into_os_string().into_vec(),
            scan_time,
            device,
            None,
        );
        crawler.root_key = Some(record.key());
        crawler.note(&record);
        crawler.pending_root = Some(record);

        if meta.is_dir() {
            match fs::read_dir(&root) {
                Ok(entries) => {
                    crawler.progress.dirs_scanned += 1;
                    crawler.stack.push(Frame {
                        entries,
                        device,
                        inode: meta.ino(),
                        parent_inode: None,
                        record: None,
                    });
                }
                Err(e) => {
                    debug!(path = %root.display(), error = %e, "cannot list scan root");
                    crawler.progress.unlistable += 1;
                }
            }
        }

        crawler
    }

    /// Key of the scan root, `None` if the root could not be stat-ed
    pub fn root_key(&self) -> Option<InodeKey> {
        self.root_key
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Timestamp shared by every record of this crawl
    pub fn scan_time(&self) -> f64 {
        self.scan_time
    }

    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    fn note(&mut self, record: &InventoryRecord) {
        self.progress.records += 1;
        self.progress.bytes_scanned += record.size.unwrap_or(0);
    }

    /// Decide whether a listed directory gets descended into
    fn should_descend(&mut self, meta: &Metadata, parent_device: u64, path: &Path) -> bool {
        if meta.dev() != parent_device {
            debug!(path = %path.display(), "not crossing device boundary");
            self.progress.boundaries += 1;
            return false;
        }

        if self.config.guard_ancestry
            && self
                .stack
                .iter()
                .any(|f| f.inode == meta.ino() && f.device == meta.dev())
        {
            warn!(path = %path.display(), "directory is its own ancestor, not descending");
            return false;
        }

        true
    }
}

impl Iterator for Crawler {
    type Item = InventoryRecord;

    fn next(&mut self) -> Option<InventoryRecord> {
        if let Some(root) = self.pending_root.take() {
            return Some(root);
        }

        loop {
            let frame = self.stack.last_mut()?;
            let (device, parent_inode, ancestor_inode) =
                (frame.device, frame.inode, frame.parent_inode);

            let entry = match frame.entries.next() {
                None => {
                    let done = self.stack.pop()?;
                    match done.record {
                        Some(record) => return Some(record),
                        None => continue,
                    }
                }
                Some(Err(e)) => {
                    debug!(error = %e, "directory iteration failed");
                    continue;
                }
                Some(Ok(entry)) => entry,
            };

            let path = entry.path();
            let basename = entry.file_name().into_vec();

            let meta = match classify(fs::symlink_metadata(&path)) {
                EntryStat::Stat(meta) => meta,
                EntryStat::Vanished => {
                    debug!(path = %path.display(), "entry vanished before stat");
                    self.progress.vanished += 1;
                    continue;
                }
                EntryStat::Unreadable(e) => {
                    debug!(path = %path.display(), error = %e, "cannot stat entry");
                    self.progress.unreadable += 1;
                    let record = InventoryRecord::placeholder(
                        entry.ino(),
                        device,
                        parent_inode,
                        basename,
                        self.scan_time,
                        self.root_device(),
                        ancestor_inode,
                    );
                    self.note(&record);
                    return Some(record);
                }
            };

            let mut record = InventoryRecord::from_metadata(
                &meta,
                device,
                Some(parent_inode),
                basename,
                self.scan_time,
                self.root_device(),
                ancestor_inode,
            );
            record.inode = entry_inode(&meta, device, entry.ino());
            self.note(&record);

            if meta.is_dir() && self.should_descend(&meta, device, &path) {
                match fs::read_dir(&path) {
                    Ok(entries) => {
                        self.progress.dirs_scanned += 1;
                        self.stack.push(Frame {
                            entries,
                            device: meta.dev(),
                            inode: meta.ino(),
                            parent_inode: Some(parent_inode),
                            record: Some(record),
                        });
                        continue;
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "cannot list directory");
                        self.progress.unlistable += 1;
                    }
                }
            }

            return Some(record);
        }
    }
}

impl Crawler {
    fn root_device(&self) -> u64 {
        self.root_key.map(|k| k.device).unwrap_or(0)
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Crawl several roots in parallel, one thread per root
///
/// Records are sent over a channel bounded to `capacity` messages, so a slow
/// consumer holds the crawlers back. Dropping the receiver stops every crawl
/// at its next send. Each handle returns the final progress of its root.
pub fn scan_roots(
    roots: Vec<PathBuf>,
    config: ScanConfig,
    capacity: usize,
) -> (Receiver<ScanMessage>, Vec<JoinHandle<ScanProgress>>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));

    let handles = roots
        .into_iter()
        .map(|root| {
            let tx = tx.clone();
            let config = config.clone();
            std::thread::spawn(move || {
                let mut crawler = Crawler::new(root.clone(), config);
                if crawler.root_key().is_none() {
                    let _ = tx.send(ScanMessage::Missing(root));
                    return ScanProgress::default();
                }

                for record in crawler.by_ref() {
                    if tx.send(ScanMessage::Record(record)).is_err() {
                        debug!(root = %root.display(), "consumer went away, stopping crawl");
                        return crawler.progress().clone();
                    }
                }

                let progress = crawler.progress().clone();
                info!(
                    root = %root.display(),
                    records = progress.records,
                    errors = progress.errors(),
                    "scan completed"
                );
                let _ = tx.send(ScanMessage::Completed {
                    root,
                    progress: progress.clone(),
                });
                progress
            })
        })
        .collect();

    (rx, handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn crawl(path: &Path) -> Vec<InventoryRecord> {
        Crawler::new(path, ScanConfig::default()).collect()
    }

    fn by_name(records: &[InventoryRecord]) -> HashMap<String, &InventoryRecord> {
        records.iter().map(|r| (r.display_name(), r)).collect()
    }

    fn running_as_root() -> bool {
        nix::unistd::geteuid().is_root()
    }

    #[test]
    fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let mut crawler = Crawler::new(temp.path().join("nope"), ScanConfig::default());
        assert!(crawler.root_key().is_none());
        assert!(crawler.next().is_none());
    }

    #[test]
    fn test_empty_dir_yields_root_only() {
        let temp = TempDir::new().unwrap();
        let records = crawl(temp.path());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_scan_root());
        assert_eq!(
            records[0].basename,
            temp.path().as_os_str().as_encoded_bytes()
        );
    }

    #[test]
    fn test_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("lonely.txt");
        fs::write(&file, "hello").unwrap();

        let records = crawl(&file);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, Some(5));
        assert!(records[0].is_scan_root());
    }

    #[test]
    fn test_one_record_per_entry() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "0123456789").unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();
        fs::write(temp.path().join("subdir/b.txt"), "01234567890123456789").unwrap();
        fs::create_dir_all(temp.path().join("subdir/deeper/deepest")).unwrap();

        let records = crawl(temp.path());
        assert_eq!(records.len(), 6);

        let keys: HashSet<_> = records.iter().map(|r| r.key()).collect();
        assert_eq!(keys.len(), records.len());

        let scan_time = records[0].scan_time;
        assert!(records.iter().all(|r| r.scan_time == scan_time));

        let roots: Vec<_> = records.iter().filter(|r| r.is_scan_root()).collect();
        assert_eq!(roots.len(), 1);

        // Every parent edge resolves to a directory record of the same crawl
        for rec in records.iter().filter(|r| !r.is_scan_root()) {
            let parent = records
                .iter()
                .find(|p| Some(p.inode) == rec.parent_inode && p.device == rec.device)
                .expect("parent record");
            assert!(parent.is_directory());
        }

        let names = by_name(&records);
        assert_eq!(names["a.txt"].size, Some(10));
        assert_eq!(names["b.txt"].size, Some(20));
        assert_eq!(names["b.txt"].parent_inode, Some(names["subdir"].inode));
        assert_eq!(names["b.txt"].ancestor_inode, Some(roots[0].inode));
        assert_eq!(names["a.txt"].ancestor_inode, None);
        assert_eq!(names["deepest"].ancestor_inode, Some(names["subdir"].inode));
    }

    #[test]
    fn test_symlink_to_ancestor_is_not_followed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("dir/loop")).unwrap();

        let records = crawl(temp.path());
        assert_eq!(records.len(), 3);
        let names = by_name(&records);
        assert!(!names["loop"].is_directory());
    }

    #[test]
    fn test_progress_counts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "abc").unwrap();
        fs::create_dir(temp.path().join("d")).unwrap();

        let mut crawler = Crawler::new(temp.path(), ScanConfig::default());
        let count = crawler.by_ref().count() as u64;
        let progress = crawler.progress();
        assert_eq!(progress.records, count);
        assert_eq!(progress.dirs_scanned, 2);
        assert_eq!(progress.errors(), 0);
    }

    #[test]
    fn test_unstatable_entries_become_placeholders() {
        if running_as_root() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("secret"), "data").unwrap();
        // Listable but not searchable: names can be read, stat fails
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        let records = crawl(temp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(records.len(), 3);
        let names = by_name(&records);
        let secret = names["secret"];
        assert!(secret.is_unreadable());
        assert_eq!(secret.size, None);
        assert_eq!(secret.mtime, None);
        assert_eq!(secret.uid, None);
        assert_eq!(secret.gid, None);
        assert_eq!(secret.parent_inode, Some(names["locked"].inode));
    }

    #[test]
    fn test_unlistable_directory_stops_descent() {
        if running_as_root() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let closed = temp.path().join("closed");
        fs::create_dir(&closed).unwrap();
        fs::write(closed.join("hidden"), "data").unwrap();
        fs::set_permissions(&closed, fs::Permissions::from_mode(0o000)).unwrap();

        let mut crawler = Crawler::new(temp.path(), ScanConfig::default());
        let records: Vec<_> = crawler.by_ref().collect();
        fs::set_permissions(&closed, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(records.len(), 2);
        assert!(!by_name(&records)["closed"].is_unreadable());
        assert_eq!(crawler.progress().unlistable, 1);
    }

    #[test]
    fn test_classify() {
        let gone = io::Error::from(io::ErrorKind::NotFound);
        assert!(matches!(classify(Err(gone)), EntryStat::Vanished));

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(matches!(classify(Err(denied)), EntryStat::Unreadable(_)));

        let other = io::Error::other("stale handle");
        assert!(matches!(classify(Err(other)), EntryStat::Unreadable(_)));
    }

    #[test]
    fn test_entry_inode_keys_mount_points_by_listed_inode() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("f"), "x").unwrap();
        let listed = fs::read_dir(temp.path()).unwrap().next().unwrap().unwrap();
        let meta = fs::symlink_metadata(listed.path()).unwrap();

        assert_eq!(entry_inode(&meta, meta.dev(), listed.ino()), meta.ino());
        assert_eq!(listed.ino(), meta.ino());

        // Seen from a directory on another device, st_ino is not trusted
        assert_eq!(entry_inode(&meta, meta.dev() + 1, 4242), 4242);
    }

    #[test]
    fn test_device_boundary_is_not_descended() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let meta = fs::metadata(&sub).unwrap();

        let mut crawler = Crawler::new(temp.path(), ScanConfig::default());
        assert!(!crawler.should_descend(&meta, meta.dev() + 1, &sub));
        assert_eq!(crawler.progress().boundaries, 1);

        assert!(crawler.should_descend(&meta, meta.dev(), &sub));
        assert_eq!(crawler.progress().boundaries, 1);
    }

    #[test]
    fn test_ancestor_on_stack_is_not_descended() {
        let temp = TempDir::new().unwrap();
        let root_meta = fs::metadata(temp.path()).unwrap();

        // The root's listing is open, so the root is its own ancestor here
        let mut guarded = Crawler::new(temp.path(), ScanConfig::default());
        assert!(!guarded.should_descend(&root_meta, root_meta.dev(), temp.path()));
        assert_eq!(guarded.progress().boundaries, 0);

        let mut unguarded = Crawler::new(
            temp.path(),
            ScanConfig {
                guard_ancestry: false,
            },
        );
        assert!(unguarded.should_descend(&root_meta, root_meta.dev(), temp.path()));
    }

    #[test]
    fn test_entries_vanishing_mid_listing_are_skipped() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        for i in 0..10 {
            fs::write(sub.join(format!("f{i}")), "x").unwrap();
        }

        let mut crawler = Crawler::new(temp.path(), ScanConfig::default());
        let root = crawler.next().unwrap();
        assert!(root.is_scan_root());

        // `sub` is listed and its first file stat-ed; the rest are already
        // buffered by readdir when they disappear
        let first = crawler.next().unwrap();
        assert_eq!(first.parent_inode, Some(fs::metadata(&sub).unwrap().ino()));
        for i in 0..10 {
            let _ = fs::remove_file(sub.join(format!("f{i}")));
        }

        let rest: Vec<_> = crawler.by_ref().collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].display_name(), "sub");
        assert_eq!(crawler.progress().vanished, 9);
        assert_eq!(crawler.progress().records, 3);
        assert_eq!(crawler.progress().errors(), 0);
    }

    #[test]
    fn test_scan_roots_in_parallel() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::write(a.path().join("one"), "1").unwrap();
        fs::write(b.path().join("two"), "22").unwrap();
        fs::write(b.path().join("three"), "333").unwrap();
        let missing = a.path().join("missing");

        let (rx, handles) = scan_roots(
            vec![a.path().to_path_buf(), b.path().to_path_buf(), missing.clone()],
            ScanConfig::default(),
            1,
        );

        let mut records = 0;
        let mut completed = 0;
        let mut missing_seen = Vec::new();
        for msg in rx {
            match msg {
                ScanMessage::Record(_) => records += 1,
                ScanMessage::Completed { .. } => completed += 1,
                ScanMessage::Missing(root) => missing_seen.push(root),
            }
        }

        assert_eq!(records, 5);
        assert_eq!(completed, 2);
        assert_eq!(missing_seen, vec![missing]);

        let totals: u64 = handles.into_iter().map(|h| h.join().unwrap().records).sum();
        assert_eq!(totals, 5);
    }
}
