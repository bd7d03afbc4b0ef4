use std::path::Path;

use dusql_core::{DuSummary, format_count, format_size};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use super::theme::Theme;

/// Header widget showing title, directory and its totals
pub struct Header<'a> {
    dir: &'a Path,
    totals: DuSummary,
    theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(dir: &'a Path, totals: DuSummary, theme: &'a Theme) -> Self {
        Self { dir, totals, theme }
    }
}

impl Widget for Header<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 1 {
            return;
        }

        let title = "DUSQL";
        let title_style = Style::default()
            .fg(self.theme.blue)
            .add_modifier(Modifier::BOLD);
        buf.set_string(area.x + 1, area.y, title, title_style);
        buf.set_string(
            area.x + 7,
            area.y,
            "─",
            Style::default().fg(self.theme.border),
        );

        let status = format!(
            "{} inodes, {}",
            format_count(self.totals.inodes),
            format_size(self.totals.size)
        );

        // Keep the tail of long paths
        let path = self.dir.to_string_lossy();
        let max_path_len = (area.width as usize).saturating_sub(status.len() + 14);
        let display_path = if path.chars().count() > max_path_len {
            let tail: String = path
                .chars()
                .rev()
                .take(max_path_len.saturating_sub(1))
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("…{tail}")
        } else {
            path.into_owned()
        };
        buf.set_string(
            area.x + 9,
            area.y,
            &display_path,
            Style::default().fg(self.theme.fg),
        );

        let status_x = area.x + area.width.saturating_sub(status.len() as u16 + 2);
        buf.set_string(
            status_x,
            area.y,
            &status,
            Style::default().fg(self.theme.fg_dim),
        );
    }
}
