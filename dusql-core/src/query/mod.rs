//! Find and du over a stored inventory
//!
//! No paths are stored. The descendants of a root are the transitive closure
//! of the `(parent_inode, device) -> (inode, device)` edge within the root's
//! generation, expanded breadth-first. Paths are built on the way down by
//! joining basenames; the root's own path comes from walking parent pointers
//! up to its scan root.

mod request;

pub use request::{FindRequest, Predicate};

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::os::unix::fs::{DirEntryExt, MetadataExt};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::record::{InodeKey, InventoryRecord, lossy_text};
use crate::store::RecordStore;

/// Query engine configuration
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Whether each root entry belongs to its own descendant set
    pub include_root: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { include_root: true }
    }
}

/// A record reached from a query root, with its reconstructed path
#[derive(Debug, Clone, PartialEq)]
pub struct Descendant {
    pub record: InventoryRecord,
    pub path: Vec<u8>,
}

impl Descendant {
    pub fn display_path(&self) -> String {
        lossy_text(&self.path)
    }
}

/// Total size and entry count of a descendant set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuSummary {
    /// Sum of `size`, unreadable entries counting as 0
    pub size: u64,
    pub inodes: u64,
}

impl DuSummary {
    fn add(&mut self, record: &InventoryRecord) {
        self.size = self.size.saturating_add(record.size.unwrap_or(0));
        self.inodes = self.inodes.saturating_add(1);
    }
}

/// Stateless query front end over a [`RecordStore`]
pub struct QueryEngine<S> {
    store: S,
    config: QueryConfig,
}

impl<S: RecordStore> QueryEngine<S> {
    pub fn new(store: S, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Key under which a live path is stored
    ///
    /// A mount point is stored under its parent's device and the inode of
    /// the directory it covers (see [`crate::scanner::entry_inode`]). The
    /// path's own key is tried first, then that parent-side key.
    pub fn key_for_path(&self, path: &Path) -> Result<InodeKey> {
        let own = InodeKey::of_path(path)?;
        if self.store.lookup(own)?.is_some() {
            return Ok(own);
        }
        let (Some(parent), Some(name)) = (
            path.parent().filter(|p| !p.as_os_str().is_empty()),
            path.file_name(),
        ) else {
            return Ok(own);
        };
        let device = fs::metadata(parent)?.dev();
        if device == own.device {
            return Ok(own);
        }

        let listed = fs::read_dir(parent)?
            .flatten()
            .find(|entry| entry.file_name() == name)
            .map(|entry| entry.ino());
        let Some(inode) = listed else {
            return Ok(own);
        };
        let covered = InodeKey::new(device, inode);
        Ok(if self.store.lookup(covered)?.is_some() {
            covered
        } else {
            own
        })
    }

    /// Full path of `record`, built by ascending to its scan root
    pub fn path_of(&self, record: &InventoryRecord) -> Result<Vec<u8>> {
        let mut names = vec![record.basename.clone()];
        let mut seen = HashSet::from([record.key()]);
        let mut current = record.clone();

        while let Some(parent) = self.store.parent(&current)? {
            if !seen.insert(parent.key()) {
                debug!(inode = parent.inode, "parent chain loops, stopping ascent");
                break;
            }
            names.push(parent.basename.clone());
            current = parent;
        }

        if !current.is_scan_root() {
            debug!(inode = current.inode, "parent chain is incomplete");
        }

        let mut path = Vec::new();
        for name in names.iter().rev() {
            join(&mut path, name);
        }
        Ok(path)
    }

    /// Breadth-first closure below `roots`
    ///
    /// Roots missing from the store contribute nothing. Each record is
    /// yielded at most once even when roots overlap.
    pub fn descendants(&self, roots: &[InodeKey]) -> Result<Descendants<'_, S>> {
        let mut queue = VecDeque::new();
        let mut unique_roots = HashSet::new();
        // Records already yielded or queued for yielding. An unyielded root
        // stays out of it so it still counts when reached from another root.
        let mut seen = HashSet::new();

        for &key in roots {
            let Some(record) = self.store.lookup(key)? else {
                debug!(device = key.device, inode = key.inode, "query root not in store");
                continue;
            };
            let id = (record.key(), record.scan_time.to_bits());
            if !unique_roots.insert(id) {
                continue;
            }
            if self.config.include_root {
                seen.insert(id);
            }
            let path = self.path_of(&record)?;
            queue.push_back(Pending {
                node: Descendant { record, path },
                emit: self.config.include_root,
            });
        }

        Ok(Descendants {
            store: &self.store,
            queue,
            seen,
            failed: false,
        })
    }

    /// Paths of all descendants matching the request's predicate
    pub fn find(&self, request: &FindRequest) -> Result<Vec<String>> {
        let predicate = request.predicate();
        let mut paths = Vec::new();
        for item in self.descendants(&request.roots())? {
            let item = item?;
            if predicate.matches(&item.record) {
                paths.push(item.display_path());
            }
        }
        Ok(paths)
    }

    /// Total size and count of all descendants matching the request's predicate
    pub fn du(&self, request: &FindRequest) -> Result<DuSummary> {
        let predicate = request.predicate();
        let mut summary = DuSummary::default();
        for item in self.descendants(&request.roots())? {
            let item = item?;
            if predicate.matches(&item.record) {
                summary.add(&item.record);
            }
        }
        Ok(summary)
    }
}

/// Append `name` to `path` with a single separator
fn join(path: &mut Vec<u8>, name: &[u8]) {
    if !path.is_empty() && !path.ends_with(b"/") {
        path.push(b'/');
    }
    path.extend_from_slice(name);
}

struct Pending {
    node: Descendant,
    /// Roots are expanded but only yielded with `include_root`
    emit: bool,
}

/// Iterator over a descendant set, see [`QueryEngine::descendants`]
///
/// A store failure is yielded once as `Err` and ends the iteration.
pub struct Descendants<'a, S> {
    store: &'a S,
    queue: VecDeque<Pending>,
    seen: HashSet<(InodeKey, u64)>,
    failed: bool,
}

impl<S: RecordStore> Iterator for Descendants<'_, S> {
    type Item = Result<Descendant>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            let Pending { node, emit } = self.queue.pop_front()?;

            if node.record.is_directory() {
                let children = match self.store.children(&node.record) {
                    Ok(children) => children,
                    Err(e) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                };
                for child in children {
                    if !self.seen.insert((child.key(), child.scan_time.to_bits())) {
                        continue;
                    }
                    let mut path = node.path.clone();
                    join(&mut path, &child.basename);
                    self.queue.push_back(Pending {
                        node: Descendant {
                            record: child,
                            path,
                        },
                        emit: true,
                    });
                }
            }

            if emit {
                return Some(Ok(node));
            }
        }
    }
}
