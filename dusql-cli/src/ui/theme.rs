use ratatui::style::Color;

/// Dark palette with 24-bit RGB colors
pub struct Theme {
    pub bg: Color,
    pub bg_surface: Color,
    pub fg: Color,
    pub fg_dim: Color,
    pub fg_muted: Color,

    pub blue: Color,
    pub green: Color,
    pub yellow: Color,
    pub red: Color,

    pub border: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,

    // Share gradient (green -> yellow -> red)
    pub share_small: Color,
    pub share_medium: Color,
    pub share_large: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            bg: Color::Rgb(30, 30, 46),
            bg_surface: Color::Rgb(49, 50, 68),
            fg: Color::Rgb(205, 214, 244),
            fg_dim: Color::Rgb(166, 173, 200),
            fg_muted: Color::Rgb(127, 132, 156),

            blue: Color::Rgb(137, 180, 250),
            green: Color::Rgb(166, 227, 161),
            yellow: Color::Rgb(249, 226, 175),
            red: Color::Rgb(243, 139, 168),

            border: Color::Rgb(88, 91, 112),
            selection_bg: Color::Rgb(137, 180, 250),
            selection_fg: Color::Rgb(30, 30, 46),

            share_small: Color::Rgb(166, 227, 161),
            share_medium: Color::Rgb(249, 226, 175),
            share_large: Color::Rgb(243, 139, 168),
        }
    }
}

impl Theme {
    /// Color for an entry's share of its directory (0-100)
    pub fn share_color(&self, percentage: f64) -> Color {
        if percentage < 10.0 {
            self.share_small
        } else if percentage < 30.0 {
            let t = (percentage - 10.0) / 20.0;
            interpolate_color(self.share_small, self.share_medium, t)
        } else if percentage < 50.0 {
            self.share_medium
        } else {
            let t = ((percentage - 50.0) / 50.0).min(1.0);
            interpolate_color(self.share_medium, self.share_large, t)
        }
    }

    /// Entries missing from the inventory are dimmed
    pub fn name_color(&self, is_dir: bool, indexed: bool) -> Color {
        match (is_dir, indexed) {
            (_, false) => self.fg_muted,
            (true, true) => self.yellow,
            (false, true) => self.fg,
        }
    }
}

fn interpolate_color(from: Color, to: Color, t: f64) -> Color {
    match (from, to) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
            Color::Rgb(lerp(r1, r2, t), lerp(g1, g2, t), lerp(b1, b2, t))
        }
        _ => to,
    }
}

fn lerp(a: u8, b: u8, t: f64) -> u8 {
    let a = a as f64;
    let b = b as f64;
    (a + (b - a) * t).round() as u8
}
