use dusql_core::{format_count, format_size, size_percentage};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::app::{Entry, SortKey};

use super::bar_chart::render_bar;
use super::theme::Theme;

const BAR_WIDTH: usize = 20;
const SIZE_WIDTH: usize = 10;
const INODES_WIDTH: usize = 10;

/// One-level listing of a directory, preceded by a `..` row
pub struct ListView<'a> {
    entries: &'a [Entry],
    selected_index: usize,
    scroll_offset: usize,
    sort_key: SortKey,
    /// Largest value of the sort column
    largest: u64,
    theme: &'a Theme,
}

impl<'a> ListView<'a> {
    pub fn new(
        entries: &'a [Entry],
        selected_index: usize,
        scroll_offset: usize,
        sort_key: SortKey,
        largest: u64,
        theme: &'a Theme,
    ) -> Self {
        Self {
            entries,
            selected_index,
            scroll_offset,
            sort_key,
            largest,
            theme,
        }
    }

    fn share(&self, entry: &Entry) -> f64 {
        let value = match self.sort_key {
            SortKey::Size => entry.size,
            SortKey::Inodes => entry.inodes,
        };
        size_percentage(value, self.largest)
    }
}

impl Widget for ListView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let fixed = BAR_WIDTH + SIZE_WIDTH + INODES_WIDTH + 6;
        if area.height < 1 || (area.width as usize) < fixed + 10 {
            return;
        }
        let name_width = area.width as usize - fixed;

        let rows = std::iter::once(None).chain(self.entries.iter().map(Some));
        for (i, entry) in rows
            .enumerate()
            .skip(self.scroll_offset)
            .take(area.height as usize)
        {
            let y = area.y + (i - self.scroll_offset) as u16;
            let is_cursor = i == self.selected_index;

            let row_style = if is_cursor {
                Style::default()
                    .bg(self.theme.selection_bg)
                    .fg(self.theme.selection_fg)
            } else {
                Style::default().fg(self.theme.fg).bg(self.theme.bg)
            };
            buf.set_string(area.x, y, " ".repeat(area.width as usize), row_style);

            let Some(entry) = entry else {
                buf.set_string(area.x + 1, y, "..", row_style.add_modifier(Modifier::BOLD));
                continue;
            };

            // Size and inode columns
            let mut x = area.x + 1;
            let size = if entry.is_indexed() {
                format_size(entry.size)
            } else {
                "-".to_string()
            };
            buf.set_string(x, y, format!("{size:>w$}", w = SIZE_WIDTH), row_style);
            x += SIZE_WIDTH as u16 + 1;
            let inodes = format_count(entry.inodes);
            buf.set_string(x, y, format!("{inodes:>w$}", w = INODES_WIDTH), row_style);
            x += INODES_WIDTH as u16 + 2;

            // Share bar
            let percentage = self.share(entry);
            let bar_style = if is_cursor {
                row_style
            } else {
                row_style.fg(self.theme.share_color(percentage))
            };
            buf.set_string(x, y, render_bar(percentage, BAR_WIDTH), bar_style);
            x += BAR_WIDTH as u16 + 2;

            // Name
            let mut name = entry.name.clone();
            if entry.is_dir {
                name.push('/');
            }
            if name.chars().count() > name_width {
                name = name.chars().take(name_width.saturating_sub(1)).collect();
                name.push('…');
            }
            let name_style = if is_cursor {
                row_style.add_modifier(Modifier::BOLD)
            } else if entry.is_dir {
                row_style
                    .fg(self.theme.name_color(true, entry.is_indexed()))
                    .add_modifier(Modifier::BOLD)
            } else {
                row_style.fg(self.theme.name_color(false, entry.is_indexed()))
            };
            buf.set_string(x, y, &name, name_style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(name: &str, size: u64, inodes: u64) -> Entry {
        Entry {
            name: name.to_string(),
            path: PathBuf::from(name),
            is_dir: inodes > 1,
            size,
            inodes,
        }
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_renders_parent_row_and_entries() {
        let theme = Theme::default();
        let entries = vec![entry("data", 2048, 3), entry("fresh.txt", 0, 0)];
        let area = Rect::new(0, 0, 80, 4);
        let mut buf = Buffer::empty(area);

        ListView::new(&entries, 1, 0, SortKey::Size, 2048, &theme).render(area, &mut buf);

        assert!(row_text(&buf, 0).trim_start().starts_with(".."));
        let data = row_text(&buf, 1);
        assert!(data.contains("2.0 KB"), "{data}");
        assert!(data.contains("data/"));
        let fresh = row_text(&buf, 2);
        assert!(fresh.contains('-'));
        assert!(fresh.contains("fresh.txt"));
        assert!(row_text(&buf, 3).trim().is_empty());
    }

    #[test]
    fn test_scrolls_past_parent_row() {
        let theme = Theme::default();
        let entries = vec![entry("a", 10, 1), entry("b", 5, 1)];
        let area = Rect::new(0, 0, 80, 1);
        let mut buf = Buffer::empty(area);

        ListView::new(&entries, 2, 2, SortKey::Size, 10, &theme).render(area, &mut buf);
        assert!(row_text(&buf, 0).contains(" b"));
    }
}
