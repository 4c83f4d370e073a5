//! Colors for arcs and dashboard chrome.

use crossterm::style::Color;

/// Fixed arc palette, assigned round-robin at admission.
pub const ARC_PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Red,
    Color::Blue,
];

pub fn arc_color(idx: usize) -> Color {
    ARC_PALETTE[idx % ARC_PALETTE.len()]
}

/// Dimmed counterpart used while an arc fades out.
pub fn arc_color_dim(idx: usize) -> Color {
    match arc_color(idx) {
        Color::Cyan => Color::DarkCyan,
        Color::Magenta => Color::DarkMagenta,
        Color::Yellow => Color::DarkYellow,
        Color::Green => Color::DarkGreen,
        Color::Red => Color::DarkRed,
        Color::Blue => Color::DarkBlue,
        other => other,
    }
}

// Panel and status chrome.
pub const GRATICULE: Color = Color::DarkGrey;
pub const BORDER: Color = Color::Green;
pub const PANEL_HEADER: Color = Color::White;
pub const PANEL_TEXT: Color = Color::Grey;
pub const PANEL_BAR: Color = Color::Cyan;
pub const STATUS_OK: Color = Color::Green;
pub const STATUS_WARN: Color = Color::Yellow;
pub const STATUS_ERR: Color = Color::Red;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_wraps() {
        assert_eq!(arc_color(0), arc_color(ARC_PALETTE.len()));
        assert_ne!(arc_color(0), arc_color(1));
    }
}
