//! Side panel with per-profile statistics and span summaries

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::theme::{series_color, span_color, CAUTION_AMBER, INFO_DIM, PLOT_GREEN};
use crate::analysis::{peak, summarize_spans, SpanSummary};
use crate::recording::ProfileData;

/// Per-artifact figures shown next to the chart
#[derive(Debug, Clone, PartialEq)]
struct ProfileStats {
    name: String,
    samples: usize,
    duration: f64,
    peak: Option<(f64, f64)>,
}

/// Side panel: peak of every artifact, span totals for a single one
pub struct StatusPanel {
    profiles: Vec<ProfileStats>,
    spans: Vec<SpanSummary>,
}

impl StatusPanel {
    pub fn new(profiles: &[ProfileData]) -> Self {
        let stats = profiles
            .iter()
            .map(|data| {
                let origin = data.start_time().unwrap_or_default();
                ProfileStats {
                    name: data
                        .path
                        .file_name()
                        .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
                    samples: data.samples.len(),
                    duration: data.samples.last().map_or(0.0, |s| s.timestamp - origin),
                    peak: peak(data).map(|p| (p.memory_mb, p.timestamp - origin)),
                }
            })
            .collect();

        let spans = match profiles {
            [single] => summarize_spans(single),
            _ => Vec::new(),
        };

        Self { profiles: stats, spans }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, show_spans: bool) {
        let mut lines = vec![];

        for (index, stats) in self.profiles.iter().enumerate() {
            lines.push(Line::from(Span::styled(
                format!(" {}", stats.name),
                Style::default().fg(series_color(index)).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(vec![
                Span::styled("  Peak    ", Style::default().fg(INFO_DIM)),
                match stats.peak {
                    Some((mem, at)) => Span::styled(
                        format!("{mem:.1} MiB @ {at:.1}s"),
                        Style::default().fg(CAUTION_AMBER),
                    ),
                    None => Span::styled("no samples", Style::default().fg(INFO_DIM)),
                },
            ]));
            lines.push(Line::from(vec![
                Span::styled("  Samples ", Style::default().fg(INFO_DIM)),
                Span::styled(
                    format!("{} over {:.1}s", stats.samples, stats.duration),
                    Style::default().fg(PLOT_GREEN),
                ),
            ]));
            lines.push(Line::from(""));
        }

        if show_spans && !self.spans.is_empty() {
            lines.push(Line::from(Span::styled(
                " Functions",
                Style::default().fg(PLOT_GREEN).add_modifier(Modifier::BOLD),
            )));
            for (index, summary) in self.spans.iter().enumerate() {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {} ", summary.label),
                        Style::default().fg(span_color(index)),
                    ),
                    Span::styled(
                        format!(
                            "x{} {:.2}s {:+.1} MiB",
                            summary.calls, summary.total_duration, summary.max_memory_delta
                        ),
                        Style::default().fg(INFO_DIM),
                    ),
                ]));
            }
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Status")
                .border_style(Style::default().fg(PLOT_GREEN)),
        );

        f.render_widget(paragraph, area);
    }
}
