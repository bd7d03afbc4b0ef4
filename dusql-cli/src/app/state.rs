use std::fs;
use std::os::unix::fs::{DirEntryExt, MetadataExt};
use std::path::{Path, PathBuf};

use dusql_core::{
    DuSummary, FindRequest, InodeKey, Predicate, QueryEngine, RecordStore, entry_inode,
};
use tracing::debug;

/// Application mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Browsing a directory
    Browsing,
    /// Showing help overlay
    Help,
}

/// Column the listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Size,
    Inodes,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Size => "size",
            SortKey::Inodes => "inodes",
        }
    }
}

/// A live directory entry with its inventory totals
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub inodes: u64,
}

impl Entry {
    /// Entries created after the last crawl have no records
    pub fn is_indexed(&self) -> bool {
        self.inodes > 0
    }
}

/// Browser state
///
/// The listing comes from the live filesystem; the totals of each entry come
/// from a du query against the inventory. Row 0 is always the `..` row, so
/// entry `i` sits at row `i + 1`.
pub struct AppState<S> {
    engine: QueryEngine<S>,
    predicate: Predicate,
    /// Current mode
    pub mode: AppMode,
    /// Directory being listed
    pub current_dir: PathBuf,
    /// Totals of `current_dir` itself
    pub totals: DuSummary,
    pub entries: Vec<Entry>,
    pub sort_key: SortKey,
    /// Smallest first instead of largest first
    pub reverse: bool,
    /// Selected row, including the `..` row
    pub selected_index: usize,
    pub scroll_offset: usize,
    /// Visible area height (set by UI)
    pub visible_height: usize,
    pub should_quit: bool,
    /// Error message to display
    pub error_message: Option<String>,
}

impl<S: RecordStore> AppState<S> {
    pub fn new(engine: QueryEngine<S>, predicate: Predicate, dir: PathBuf) -> Self {
        let mut state = Self {
            engine,
            predicate,
            mode: AppMode::Browsing,
            current_dir: dir,
            totals: DuSummary::default(),
            entries: Vec::new(),
            sort_key: SortKey::Size,
            reverse: false,
            selected_index: 0,
            scroll_offset: 0,
            visible_height: 20,
            should_quit: false,
            error_message: None,
        };
        state.reload();
        state
    }

    /// Re-list the current directory and re-query every entry
    pub fn reload(&mut self) {
        self.entries.clear();
        self.totals = DuSummary::default();
        self.error_message = None;

        let dir = self.current_dir.clone();
        let device = match fs::metadata(&dir) {
            Ok(meta) => meta.dev(),
            Err(e) => {
                self.error_message = Some(format!("{}: {e}", dir.display()));
                return;
            }
        };
        match self.engine.key_for_path(&dir) {
            Ok(key) => self.totals = self.du(key),
            Err(e) => self.error_message = Some(e.to_string()),
        }

        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) => {
                self.error_message = Some(format!("{}: {e}", dir.display()));
                return;
            }
        };

        for dirent in listing.flatten() {
            let path = dirent.path();
            // Keyed the way the crawler stores entries: the containing
            // directory's device, and the covered inode for a mount point
            let Ok(meta) = fs::symlink_metadata(&path) else {
                continue;
            };
            let inode = entry_inode(&meta, device, dirent.ino());
            let summary = self.du(InodeKey::new(device, inode));
            self.entries.push(Entry {
                name: dirent.file_name().to_string_lossy().into_owned(),
                path,
                is_dir: meta.is_dir(),
                size: summary.size,
                inodes: summary.inodes,
            });
        }

        debug!(dir = %dir.display(), entries = self.entries.len(), "listed directory");
        self.sort_entries();
    }

    fn du(&mut self, key: InodeKey) -> DuSummary {
        let request = FindRequest::new([key], self.predicate);
        match self.engine.du(&request) {
            Ok(summary) => summary,
            Err(e) => {
                self.error_message = Some(e.to_string());
                DuSummary::default()
            }
        }
    }

    fn sort_entries(&mut self) {
        let key = self.sort_key;
        self.entries.sort_by(|a, b| {
            let order = match key {
                SortKey::Size => b.size.cmp(&a.size),
                SortKey::Inodes => b.inodes.cmp(&a.inodes),
            };
            order.then_with(|| a.name.cmp(&b.name))
        });
        if self.reverse {
            self.entries.reverse();
        }
    }

    /// Number of rows, including `..`
    pub fn row_count(&self) -> usize {
        self.entries.len() + 1
    }

    /// Selected entry, `None` when `..` is selected
    pub fn selected_entry(&self) -> Option<&Entry> {
        self.selected_index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
    }

    fn select_path(&mut self, path: &Path) {
        let row = self
            .entries
            .iter()
            .position(|e| e.path == path)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.selected_index = row;
        self.scroll_offset = 0;
        self.ensure_visible();
    }

    fn change_dir(&mut self, dir: PathBuf) {
        self.current_dir = dir;
        self.selected_index = 0;
        self.scroll_offset = 0;
        self.reload();
    }

    /// Descend into the selected directory, or go up from the `..` row
    pub fn enter_selected(&mut self) {
        let Some(entry) = self.selected_entry() else {
            self.go_up();
            return;
        };
        if !entry.is_dir {
            return;
        }
        if !entry.is_indexed() {
            self.error_message = Some(format!("{} is not in the inventory", entry.name));
            return;
        }
        let path = entry.path.clone();
        self.change_dir(path);
    }

    /// Go to the parent directory, keeping the directory we came from selected
    pub fn go_up(&mut self) {
        let Some(parent) = self.current_dir.parent().map(Path::to_path_buf) else {
            return;
        };
        let previous = std::mem::replace(&mut self.current_dir, parent);
        self.reload();
        self.select_path(&previous);
    }

    pub fn sort_by(&mut self, key: SortKey) {
        self.sort_key = key;
        self.resort();
    }

    pub fn toggle_reverse(&mut self) {
        self.reverse = !self.reverse;
        self.resort();
    }

    fn resort(&mut self) {
        let selected = self.selected_entry().map(|e| e.path.clone());
        self.sort_entries();
        if let Some(path) = selected {
            self.select_path(&path);
        }
    }

    fn ensure_visible_for(selected: &mut usize, scroll: &mut usize, visible_height: usize) {
        if *selected < *scroll {
            *scroll = *selected;
        } else if *selected >= *scroll + visible_height {
            *scroll = *selected + 1 - visible_height.max(1);
        }
    }

    fn ensure_visible(&mut self) {
        Self::ensure_visible_for(
            &mut self.selected_index,
            &mut self.scroll_offset,
            self.visible_height,
        );
    }

    /// Move selection up
    pub fn move_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
        self.ensure_visible();
    }

    /// Move selection down
    pub fn move_down(&mut self) {
        if self.selected_index < self.row_count() - 1 {
            self.selected_index += 1;
        }
        self.ensure_visible();
    }

    /// Move selection up by a page
    pub fn page_up(&mut self) {
        let page_size = self.visible_height.saturating_sub(2).max(1);
        self.selected_index = self.selected_index.saturating_sub(page_size);
        self.ensure_visible();
    }

    /// Move selection down by a page
    pub fn page_down(&mut self) {
        let page_size = self.visible_height.saturating_sub(2).max(1);
        self.selected_index = (self.selected_index + page_size).min(self.row_count() - 1);
        self.ensure_visible();
    }

    pub fn go_to_first(&mut self) {
        self.selected_index = 0;
        self.ensure_visible();
    }

    pub fn go_to_last(&mut self) {
        self.selected_index = self.row_count() - 1;
        self.ensure_visible();
    }

    pub fn show_help(&mut self) {
        self.mode = AppMode::Help;
    }

    pub fn hide_help(&mut self) {
        self.mode = AppMode::Browsing;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Largest value of the sort column, for bar scaling
    pub fn largest(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match self.sort_key {
                SortKey::Size => e.size,
                SortKey::Inodes => e.inodes,
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dusql_core::{Crawler, MemoryStore, QueryConfig, ScanConfig};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::write(root.join("big.bin"), vec![0u8; 100_000]).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.txt"), b"hello").unwrap();
        fs::write(root.join("sub/b.txt"), b"world").unwrap();
        (temp, root)
    }

    fn browse(root: &Path, predicate: Predicate) -> AppState<MemoryStore> {
        let store = MemoryStore::from_records(Crawler::new(root, ScanConfig::default()));
        let engine = QueryEngine::new(store, QueryConfig::default());
        AppState::new(engine, predicate, root.to_path_buf())
    }

    fn names<S: RecordStore>(state: &AppState<S>) -> Vec<&str> {
        state.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_lists_entries_with_totals() {
        let (_temp, root) = setup();
        let state = browse(&root, Predicate::any());

        assert_eq!(names(&state), vec!["big.bin", "sub"]);
        assert_eq!(state.entries[0].size, 100_000);
        assert_eq!(state.entries[0].inodes, 1);
        assert!(state.entries[1].is_dir);
        assert_eq!(state.entries[1].inodes, 3);
        assert_eq!(state.totals.inodes, 5);
        assert!(state.error_message.is_none());
    }

    #[test]
    fn test_sorting() {
        let (_temp, root) = setup();
        let mut state = browse(&root, Predicate::any());

        state.sort_by(SortKey::Inodes);
        assert_eq!(names(&state), vec!["sub", "big.bin"]);

        state.toggle_reverse();
        assert_eq!(names(&state), vec!["big.bin", "sub"]);

        state.sort_by(SortKey::Size);
        assert_eq!(names(&state), vec!["sub", "big.bin"]);
    }

    #[test]
    fn test_resort_keeps_selection() {
        let (_temp, root) = setup();
        let mut state = browse(&root, Predicate::any());
        state.selected_index = 1;
        assert_eq!(state.selected_entry().unwrap().name, "big.bin");

        state.sort_by(SortKey::Inodes);
        assert_eq!(state.selected_entry().unwrap().name, "big.bin");
        assert_eq!(state.selected_index, 2);
    }

    #[test]
    fn test_enter_and_go_up() {
        let (_temp, root) = setup();
        let mut state = browse(&root, Predicate::any());

        state.selected_index = 2;
        state.enter_selected();
        assert_eq!(state.current_dir, root.join("sub"));
        assert_eq!(names(&state), vec!["a.txt", "b.txt"]);
        assert_eq!(state.selected_index, 0);

        // Files are not entered
        state.selected_index = 1;
        state.enter_selected();
        assert_eq!(state.current_dir, root.join("sub"));

        // `..` goes up and selects where we came from
        state.selected_index = 0;
        state.enter_selected();
        assert_eq!(state.current_dir, root);
        assert_eq!(state.selected_entry().unwrap().name, "sub");
    }

    #[test]
    fn test_unindexed_directory_is_not_entered() {
        let (_temp, root) = setup();
        let mut state = browse(&root, Predicate::any());
        fs::create_dir(root.join("new")).unwrap();
        state.reload();

        let row = state.entries.iter().position(|e| e.name == "new").unwrap() + 1;
        assert!(!state.entries[row - 1].is_indexed());
        state.selected_index = row;
        state.enter_selected();
        assert_eq!(state.current_dir, root);
        assert!(state.error_message.is_some());
    }

    #[test]
    fn test_predicate_filters_totals() {
        let (_temp, root) = setup();
        let state = browse(
            &root,
            Predicate {
                size: Some(50_000.0),
                ..Predicate::any()
            },
        );
        let big = state.entries.iter().find(|e| e.name == "big.bin").unwrap();
        let sub = state.entries.iter().find(|e| e.name == "sub").unwrap();
        assert_eq!(big.inodes, 1);
        assert_eq!(sub.inodes, 0);
    }

    #[test]
    fn test_navigation_bounds() {
        let (_temp, root) = setup();
        let mut state = browse(&root, Predicate::any());
        state.visible_height = 2;

        state.move_up();
        assert_eq!(state.selected_index, 0);
        state.go_to_last();
        assert_eq!(state.selected_index, 2);
        assert_eq!(state.scroll_offset, 1);
        state.move_down();
        assert_eq!(state.selected_index, 2);
        state.page_up();
        assert_eq!(state.selected_index, 1);
        state.go_to_first();
        assert_eq!(state.scroll_offset, 0);
    }
}
