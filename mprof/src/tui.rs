//! # Terminal Plot
//!
//! Interactive memory-vs-time plot of one or more profiles.
//!
//! ## Layout
//!
//! ```text
//! ┌ header: title, artifact count ──────────────────────────┐
//! ├ chart ─────────────────────────────────┬ status ────────┤
//! │ one curve per artifact, peak markers,  │ peak, samples, │
//! │ span brackets (single artifact only)   │ span totals    │
//! ├ keys ──────────────────────────────────┴────────────────┤
//! ```
//!
//! ## Keys
//!
//! `w`/`s` zoom in/out, `a`/`d` pan, `r` reset, `f` toggle span brackets,
//! `?` help, `q` quit.

// Layout math and the render loop read better in one place
#![allow(clippy::too_many_lines)]

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use std::io;
use std::time::Duration;

pub mod chart;
mod status;
mod theme;

use chart::{PlotSeries, SpanBracket, Viewport};
use status::StatusPanel;
use theme::{CAUTION_AMBER, INFO_DIM, PLOT_GREEN};

use crate::recording::ProfileData;

// =============================================================================
// STYLE CONSTANTS
// =============================================================================

const STYLE_HEADING: Style = Style::new().fg(PLOT_GREEN).add_modifier(Modifier::BOLD);
const STYLE_LABEL: Style = Style::new().fg(CAUTION_AMBER).add_modifier(Modifier::BOLD);
const STYLE_DIM: Style = Style::new().fg(INFO_DIM);
const STYLE_KEY: Style = Style::new().fg(CAUTION_AMBER);
const STYLE_TEXT: Style = Style::new().fg(ratatui::style::Color::White);

/// Visible width multiplier per zoom step
const ZOOM_STEP: f64 = 0.5;

/// Fraction of the visible width moved per pan step
const PAN_STEP: f64 = 0.25;

/// Plot settings from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    pub title: Option<String>,
    /// Draw span brackets (only possible with exactly one artifact)
    pub show_spans: bool,
    /// Initial time window, seconds relative to the first sample
    pub window: Option<(f64, f64)>,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self { title: None, show_spans: true, window: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ViewMode {
    Plot,
    Help,
}

/// Plot application over a fixed set of loaded profiles
pub struct App {
    title: String,
    profile_count: usize,
    series: Vec<PlotSeries>,
    brackets: Vec<SpanBracket>,
    status_panel: StatusPanel,
    viewport: Viewport,
    show_spans: bool,
    view_mode: ViewMode,
    should_quit: bool,
}

impl App {
    #[must_use]
    pub fn new(profiles: &[ProfileData], options: &PlotOptions) -> Self {
        let series: Vec<PlotSeries> = profiles.iter().map(PlotSeries::from_profile).collect();
        let brackets = match profiles {
            [single] => chart::span_brackets(single),
            _ => Vec::new(),
        };
        let title = options.title.clone().unwrap_or_else(|| default_title(profiles));

        Self {
            title,
            profile_count: profiles.len(),
            status_panel: StatusPanel::new(profiles),
            viewport: Viewport::new(&series, options.window),
            show_spans: options.show_spans && !brackets.is_empty(),
            series,
            brackets,
            view_mode: ViewMode::Plot,
            should_quit: false,
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        match self.view_mode {
            ViewMode::Plot => match key {
                KeyCode::Char('q' | 'Q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('f' | 'F') => {
                    self.show_spans = !self.show_spans && !self.brackets.is_empty();
                }
                KeyCode::Char('w' | 'W') => self.viewport.zoom(ZOOM_STEP),
                KeyCode::Char('s' | 'S') => self.viewport.zoom(1.0 / ZOOM_STEP),
                KeyCode::Char('a' | 'A') | KeyCode::Left => self.viewport.pan(-PAN_STEP),
                KeyCode::Char('d' | 'D') | KeyCode::Right => self.viewport.pan(PAN_STEP),
                KeyCode::Char('r' | 'R') => self.viewport.reset(),
                KeyCode::Char('?') => self.view_mode = ViewMode::Help,
                _ => {}
            },
            ViewMode::Help => self.view_mode = ViewMode::Plot,
        }
    }

    fn draw(&self, f: &mut ratatui::Frame) {
        let outer_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Chart and status
                Constraint::Length(3), // Keys
            ])
            .split(f.area());

        let header = Paragraph::new(vec![Line::from(vec![
            Span::styled("MPROF", STYLE_HEADING),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(self.title.clone(), Style::new().fg(PLOT_GREEN)),
            Span::styled(" | ", STYLE_DIM),
            Span::styled(
                format!(
                    "{} profile{}",
                    self.profile_count,
                    if self.profile_count == 1 { "" } else { "s" }
                ),
                Style::new().fg(PLOT_GREEN),
            ),
        ])])
        .block(Block::default().borders(Borders::ALL).border_style(Style::new().fg(PLOT_GREEN)));
        f.render_widget(header, outer_layout[0]);

        let main_area = outer_layout[1];
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
            .split(main_area);

        let brackets: &[SpanBracket] = if self.show_spans { &self.brackets } else { &[] };
        chart::render(f, cols[0], &self.title, &self.series, brackets, &self.viewport);
        self.status_panel.render(f, cols[1], self.show_spans);

        if self.view_mode == ViewMode::Help {
            render_help_overlay(f, main_area);
        }

        let status_line = match self.view_mode {
            ViewMode::Plot => {
                let spans_state = if self.brackets.is_empty() {
                    Span::styled("[No spans]", STYLE_DIM)
                } else if self.show_spans {
                    Span::styled("[Spans]", Style::default().fg(PLOT_GREEN))
                } else {
                    Span::styled("[Spans hidden]", Style::default().fg(CAUTION_AMBER))
                };
                Line::from(vec![
                    Span::styled("Q", STYLE_KEY),
                    Span::styled(":Quit ", STYLE_DIM),
                    Span::styled("W/S", STYLE_KEY),
                    Span::styled(":Zoom ", STYLE_DIM),
                    Span::styled("A/D", STYLE_KEY),
                    Span::styled(":Pan ", STYLE_DIM),
                    Span::styled("F", STYLE_KEY),
                    Span::styled(":Spans ", STYLE_DIM),
                    Span::styled("?", STYLE_KEY),
                    Span::styled(":Help ", STYLE_DIM),
                    spans_state,
                ])
            }
            ViewMode::Help => Line::from(vec![
                Span::styled("Any key", STYLE_KEY),
                Span::styled(":Close ", STYLE_DIM),
                Span::styled("[Help]", Style::default().fg(PLOT_GREEN)),
            ]),
        };

        let status = Paragraph::new(vec![status_line]).block(
            Block::default().borders(Borders::ALL).border_style(Style::default().fg(PLOT_GREEN)),
        );
        f.render_widget(status, outer_layout[2]);
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }

    /// Run the TUI event loop
    ///
    /// # Errors
    /// Returns an error if terminal setup or rendering fails
    pub fn run(mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore the terminal even when drawing failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }
}

fn default_title(profiles: &[ProfileData]) -> String {
    match profiles {
        [single] => single.command_line.clone().unwrap_or_else(|| "memory usage".to_string()),
        _ => "memory usage".to_string(),
    }
}

/// Render the help overlay with keyboard shortcuts
fn render_help_overlay(f: &mut ratatui::Frame, area: Rect) {
    let popup_area = centered_popup(area, 70, 18);

    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled("  What You're Looking At", STYLE_HEADING)),
        Line::from(Span::styled(
            "  Resident memory of the profiled process over time, one curve per",
            STYLE_DIM,
        )),
        Line::from(Span::styled(
            "  profile. Time starts at each profile's first sample.",
            STYLE_DIM,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Peak      ", STYLE_LABEL),
            Span::styled("Red marker at the first highest reading.", STYLE_DIM),
        ]),
        Line::from(vec![
            Span::styled("  Brackets  ", STYLE_LABEL),
            Span::styled("Function calls recorded by the instrumentation.", STYLE_DIM),
        ]),
        Line::from(""),
        Line::from(Span::styled("  Keys", STYLE_HEADING)),
        Line::from(vec![
            Span::styled("  W/S", STYLE_KEY),
            Span::styled(" Zoom   ", STYLE_TEXT),
            Span::styled("A/D", STYLE_KEY),
            Span::styled(" Pan   ", STYLE_TEXT),
            Span::styled("R", STYLE_KEY),
            Span::styled(" Reset   ", STYLE_TEXT),
            Span::styled("F", STYLE_KEY),
            Span::styled(" Brackets   ", STYLE_TEXT),
            Span::styled("Q", STYLE_KEY),
            Span::styled(" Quit", STYLE_TEXT),
        ]),
        Line::from(""),
        Line::from(Span::styled("  Press any key to close", STYLE_DIM)),
    ];

    let help_widget = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .style(Style::new().bg(ratatui::style::Color::Black).fg(PLOT_GREEN)),
    );

    f.render_widget(ratatui::widgets::Clear, popup_area);
    f.render_widget(help_widget, popup_area);
}

/// Create a centered popup area with given width percentage and height in lines
fn centered_popup(area: Rect, width_percent: u16, height_lines: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(height_lines), Constraint::Fill(1)])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}
