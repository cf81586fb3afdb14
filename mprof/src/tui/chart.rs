//! Memory-vs-time chart
//!
//! Turns loaded profiles into plottable series (time relative to each
//! profile's first sample) and renders them with ratatui's `Chart`.

use ratatui::{
    layout::Rect,
    style::Style,
    symbols::Marker,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, LegendPosition},
    Frame,
};

use super::theme::{series_color, span_color, CRITICAL_RED, INFO_DIM, PLOT_GREEN};
use crate::analysis::find_peak;
use crate::recording::ProfileData;

/// Smallest visible time range when zooming, seconds
const MIN_WINDOW: f64 = 0.01;

/// One artifact's memory curve
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSeries {
    pub name: String,
    /// `(seconds since first sample, MiB)`
    pub points: Vec<(f64, f64)>,
    pub peak: Option<(f64, f64)>,
}

impl PlotSeries {
    #[must_use]
    pub fn from_profile(data: &ProfileData) -> Self {
        let origin = data.start_time().unwrap_or_default();
        let points: Vec<(f64, f64)> =
            data.samples.iter().map(|s| (s.timestamp - origin, s.memory_mb)).collect();
        let peak = find_peak(&data.samples).map(|p| (p.timestamp - origin, p.memory_mb));
        let name = data.path.file_name().map_or_else(
            || data.path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        Self { name, points, peak }
    }

    fn duration(&self) -> f64 {
        self.points.iter().map(|&(t, _)| t).fold(0.0, f64::max)
    }
}

/// A labeled span drawn as a bracket over the curve: up at entry, across,
/// down at exit
#[derive(Debug, Clone, PartialEq)]
pub struct SpanBracket {
    pub label: String,
    /// Position of the label in first-seen order, selects the color
    pub label_index: usize,
    pub points: [(f64, f64); 4],
}

/// Brackets for every span of `data`, on the same time axis as its series
#[must_use]
pub fn span_brackets(data: &ProfileData) -> Vec<SpanBracket> {
    let origin = data.start_time().unwrap_or_default();
    data.spans_by_label
        .iter()
        .enumerate()
        .flat_map(|(label_index, (label, spans))| {
            spans.iter().map(move |span| {
                let start = span.start_time - origin;
                let end = span.end_time - origin;
                let top = span.start_mem.max(span.end_mem) * 1.02;
                SpanBracket {
                    label: label.clone(),
                    label_index,
                    points: [
                        (start, span.start_mem),
                        (start, top),
                        (end, top),
                        (end, span.end_mem),
                    ],
                }
            })
        })
        .collect()
}

/// Visible time range with zoom and pan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    full: (f64, f64),
    visible: (f64, f64),
}

impl Viewport {
    /// Viewport over `series`, starting at `window` when given
    #[must_use]
    pub fn new(series: &[PlotSeries], window: Option<(f64, f64)>) -> Self {
        let end = series.iter().map(PlotSeries::duration).fold(0.0, f64::max).max(MIN_WINDOW);
        let full = (0.0, end);
        let visible = window.filter(|(s, e)| e > s).unwrap_or(full);
        Self { full, visible }
    }

    #[must_use]
    pub fn bounds(&self) -> [f64; 2] {
        [self.visible.0, self.visible.1]
    }

    fn width(&self) -> f64 {
        self.visible.1 - self.visible.0
    }

    /// Scale the visible width by `factor` around its center
    pub fn zoom(&mut self, factor: f64) {
        let center = (self.visible.0 + self.visible.1) / 2.0;
        let full_width = self.full.1 - self.full.0;
        let half = (self.width() * factor).clamp(MIN_WINDOW, full_width.max(MIN_WINDOW)) / 2.0;
        self.visible = (center - half, center + half);
        self.clamp();
    }

    /// Shift by `fraction` of the visible width (negative pans left)
    pub fn pan(&mut self, fraction: f64) {
        let shift = self.width() * fraction;
        self.visible = (self.visible.0 + shift, self.visible.1 + shift);
        self.clamp();
    }

    pub fn reset(&mut self) {
        self.visible = self.full;
    }

    /// Keep the window inside the data without changing its width
    fn clamp(&mut self) {
        let width = self.width();
        if self.visible.0 < self.full.0 {
            self.visible = (self.full.0, self.full.0 + width);
        }
        if self.visible.1 > self.full.1 && width <= self.full.1 - self.full.0 {
            self.visible = (self.full.1 - width, self.full.1);
        }
    }

    /// Highest memory inside the window, padded for headroom
    fn memory_ceiling(&self, series: &[PlotSeries], brackets: &[SpanBracket]) -> f64 {
        let [lo, hi] = self.bounds();
        let visible = |&(t, _): &(f64, f64)| t >= lo && t <= hi;
        let curve = series.iter().flat_map(|s| s.points.iter()).filter(|p| visible(*p));
        let marks = brackets.iter().flat_map(|b| b.points.iter()).filter(|p| visible(*p));
        let max = curve.chain(marks).map(|&(_, m)| m).fold(0.0, f64::max);
        (max * 1.1).max(1.0)
    }
}

/// Draw every series (plus brackets when given) inside `area`
pub fn render(
    f: &mut Frame,
    area: Rect,
    title: &str,
    series: &[PlotSeries],
    brackets: &[SpanBracket],
    viewport: &Viewport,
) {
    let mut datasets = Vec::with_capacity(series.len() * 2 + brackets.len());

    for (index, s) in series.iter().enumerate() {
        datasets.push(
            Dataset::default()
                .name(s.name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(index)))
                .data(&s.points),
        );
    }
    for b in brackets {
        datasets.push(
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(span_color(b.label_index)))
                .data(&b.points),
        );
    }
    // Peaks last so they stay on top
    for s in series {
        if let Some(peak) = &s.peak {
            datasets.push(
                Dataset::default()
                    .marker(Marker::Block)
                    .graph_type(GraphType::Scatter)
                    .style(Style::default().fg(CRITICAL_RED))
                    .data(std::slice::from_ref(peak)),
            );
        }
    }

    let [t0, t1] = viewport.bounds();
    let ceiling = viewport.memory_ceiling(series, brackets);
    let label_style = Style::default().fg(INFO_DIM);

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {title} "))
                .border_style(Style::default().fg(PLOT_GREEN)),
        )
        .legend_position(Some(LegendPosition::TopLeft))
        .x_axis(
            Axis::default()
                .title("time (s)")
                .style(label_style)
                .bounds([t0, t1])
                .labels([
                    format!("{t0:.1}"),
                    format!("{:.1}", (t0 + t1) / 2.0),
                    format!("{t1:.1}"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("memory (MiB)")
                .style(label_style)
                .bounds([0.0, ceiling])
                .labels([
                    "0".to_string(),
                    format!("{:.1}", ceiling / 2.0),
                    format!("{ceiling:.1}"),
                ]),
        );

    f.render_widget(chart, area);
}
