//! TUI color theme
//!
//! Green-on-black palette shared by every panel

use ratatui::style::Color;

pub const PLOT_GREEN: Color = Color::Rgb(0, 255, 0);
pub const CRITICAL_RED: Color = Color::Rgb(255, 0, 0);
pub const CAUTION_AMBER: Color = Color::Rgb(255, 191, 0);
pub const INFO_DIM: Color = Color::Rgb(0, 180, 0);

/// Line colors for successive artifacts
const SERIES_COLORS: [Color; 6] = [
    PLOT_GREEN,
    Color::Rgb(0, 200, 255),
    Color::Rgb(255, 120, 255),
    Color::Rgb(255, 255, 255),
    Color::Rgb(120, 160, 255),
    Color::Rgb(255, 150, 80),
];

/// Bracket colors for successive span labels
const SPAN_COLORS: [Color; 4] =
    [CAUTION_AMBER, Color::Rgb(0, 220, 220), Color::Rgb(220, 120, 255), Color::Rgb(255, 110, 110)];

#[must_use]
pub fn series_color(index: usize) -> Color {
    SERIES_COLORS[index % SERIES_COLORS.len()]
}

#[must_use]
pub fn span_color(index: usize) -> Color {
    SPAN_COLORS[index % SPAN_COLORS.len()]
}
