//! Maximum memory location and per-label span statistics

use mprof_common::Sample;

use crate::recording::ProfileData;

/// Highest memory reading of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub memory_mb: f64,
    pub timestamp: f64,
    /// Position of the sample in the series
    pub index: usize,
}

/// First sample holding the maximum memory value
#[must_use]
pub fn find_peak(samples: &[Sample]) -> Option<Peak> {
    let mut best: Option<Peak> = None;
    for (index, sample) in samples.iter().enumerate() {
        if best.map_or(true, |b| sample.memory_mb > b.memory_mb) {
            best = Some(Peak { memory_mb: sample.memory_mb, timestamp: sample.timestamp, index });
        }
    }
    best
}

/// Peak of a profile's `MEM` series
#[must_use]
pub fn peak(data: &ProfileData) -> Option<Peak> {
    find_peak(&data.samples)
}

/// Aggregated spans of one label
#[derive(Debug, Clone, PartialEq)]
pub struct SpanSummary {
    pub label: String,
    pub calls: usize,
    /// Sum of span durations, seconds
    pub total_duration: f64,
    /// Largest end-minus-start memory change of any single call
    pub max_memory_delta: f64,
}

/// One summary per label, in first-seen order
#[must_use]
pub fn summarize_spans(data: &ProfileData) -> Vec<SpanSummary> {
    data.spans_by_label
        .iter()
        .map(|(label, spans)| SpanSummary {
            label: label.clone(),
            calls: spans.len(),
            total_duration: spans.iter().map(|s| s.duration()).sum(),
            max_memory_delta: spans
                .iter()
                .map(|s| s.memory_delta())
                .fold(f64::NEG_INFINITY, f64::max),
        })
        .collect()
}
