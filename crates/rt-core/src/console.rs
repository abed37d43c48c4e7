//! Terminal styling for operator-facing text

use crossterm::style::{style, Color, Stylize};

/// Colors used on the operator console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Red,
    Green,
    Yellow,
    Magenta,
    Cyan,
}

impl From<Tint> for Color {
    fn from(tint: Tint) -> Self {
        match tint {
            Tint::Red => Color::Red,
            Tint::Green => Color::Green,
            Tint::Yellow => Color::Yellow,
            Tint::Magenta => Color::Magenta,
            Tint::Cyan => Color::Cyan,
        }
    }
}

/// Wrap `text` in the ANSI sequences for `tint`
pub fn paint(tint: Tint, text: &str) -> String {
    style(text).with(Color::from(tint)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_keeps_text() {
        let painted = paint(Tint::Red, "Error: disk full\n");
        assert!(painted.contains("Error: disk full\n"));
    }
}
