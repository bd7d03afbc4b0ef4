/// User actions that can be performed in the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move selection up
    MoveUp,
    /// Move selection down
    MoveDown,
    /// Move selection up by a page
    PageUp,
    /// Move selection down by a page
    PageDown,
    /// Go to first row
    GoToFirst,
    /// Go to last row
    GoToLast,
    /// Descend into the selected directory
    Enter,
    /// Go to the parent directory
    GoUp,
    /// Order by total size
    SortBySize,
    /// Order by inode count
    SortByInodes,
    /// Flip the sort direction
    Reverse,
    /// Re-list and re-query the current directory
    Refresh,
    /// Show help overlay
    ShowHelp,
    /// Hide help overlay
    HideHelp,
    /// Quit the application
    Quit,
    /// No action (for tick events)
    Tick,
}
