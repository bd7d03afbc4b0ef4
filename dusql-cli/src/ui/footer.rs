use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::app::{AppMode, SortKey};

use super::theme::Theme;

/// Footer widget showing keyboard hints and the active ordering
pub struct Footer<'a> {
    mode: AppMode,
    sort_key: SortKey,
    reverse: bool,
    theme: &'a Theme,
}

impl<'a> Footer<'a> {
    pub fn new(mode: AppMode, sort_key: SortKey, reverse: bool, theme: &'a Theme) -> Self {
        Self {
            mode,
            sort_key,
            reverse,
            theme,
        }
    }
}

impl Widget for Footer<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 1 {
            return;
        }

        let hints: &[(&str, &str)] = match self.mode {
            AppMode::Browsing => &[
                ("↑↓", "Navigate"),
                ("→", "Open"),
                ("←", "Up"),
                ("s", "Size"),
                ("i", "Inodes"),
                ("r", "Reverse"),
                ("?", "Help"),
                ("q", "Quit"),
            ],
            AppMode::Help => &[("Esc", "Close help")],
        };

        let key_style = Style::default()
            .fg(self.theme.fg)
            .add_modifier(Modifier::BOLD);
        let desc_style = Style::default().fg(self.theme.fg_dim);
        let sep_style = Style::default().fg(self.theme.border);

        let mut x = area.x + 1;
        for (i, (key, desc)) in hints.iter().enumerate() {
            buf.set_string(x, area.y, *key, key_style);
            x += key.chars().count() as u16 + 1;

            buf.set_string(x, area.y, *desc, desc_style);
            x += desc.len() as u16;

            if i < hints.len() - 1 {
                buf.set_string(x, area.y, "  │  ", sep_style);
                x += 5;
            }

            if x >= area.x + area.width - 5 {
                break;
            }
        }

        let order = format!(
            "by {} {}",
            self.sort_key.label(),
            if self.reverse { "↑" } else { "↓" }
        );
        let order_x = area.x + area.width.saturating_sub(order.chars().count() as u16 + 1);
        if order_x > x + 2 {
            buf.set_string(order_x, area.y, &order, Style::default().fg(self.theme.green));
        }
    }
}
