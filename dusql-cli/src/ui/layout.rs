use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Browser layout: one header row, one status row, the listing, one footer row
pub struct AppLayout {
    pub header: Rect,
    pub status: Rect,
    pub list: Rect,
    pub footer: Rect,
}

impl AppLayout {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Length(1), // Totals or error
                Constraint::Min(5),    // Listing
                Constraint::Length(1), // Footer
            ])
            .split(area);

        Self {
            header: chunks[0],
            status: chunks[1],
            list: chunks[2],
            footer: chunks[3],
        }
    }
}
