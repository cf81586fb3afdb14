//! Profile artifact reader
//!
//! Parses an artifact into a memory series and the labeled spans recorded by
//! an instrumented child. Lines are kept in file order: the reader never
//! re-sorts, so a series with clock adjustments reads back exactly as written.

use std::fs;
use std::path::{Path, PathBuf};

use mprof_common::{parse_line, Record, Sample, SpanBoundary};

use crate::domain::{FormatError, ReadProfileError};

/// One labeled execution interval with memory at both ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start_time: f64,
    pub end_time: f64,
    pub start_mem: f64,
    pub end_mem: f64,
}

impl Span {
    /// `[start_time, end_time, start_mem, end_mem]`
    #[must_use]
    pub fn values(&self) -> [f64; 4] {
        [self.start_time, self.end_time, self.start_mem, self.end_mem]
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Memory growth across the span, negative if memory was released
    #[must_use]
    pub fn memory_delta(&self) -> f64 {
        self.end_mem - self.start_mem
    }
}

impl From<&SpanBoundary> for Span {
    fn from(b: &SpanBoundary) -> Self {
        Self {
            start_time: b.start_time,
            end_time: b.end_time,
            start_mem: b.start_mem,
            end_mem: b.end_mem,
        }
    }
}

/// Everything recorded in one artifact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileData {
    pub path: PathBuf,
    /// Command line from the `CMDLINE` header, if the artifact has one
    pub command_line: Option<String>,
    /// `MEM` samples in file order
    pub samples: Vec<Sample>,
    /// `FUNC` spans grouped by label, labels in first-seen order
    pub spans_by_label: Vec<(String, Vec<Span>)>,
    /// `CHLD` samples grouped by descendant pid, pids in first-seen order
    pub children: Vec<(u32, Vec<Sample>)>,
}

impl ProfileData {
    /// Spans recorded for `label`
    #[must_use]
    pub fn spans(&self, label: &str) -> Option<&[Span]> {
        self.spans_by_label.iter().find(|(l, _)| l == label).map(|(_, spans)| spans.as_slice())
    }

    #[must_use]
    pub fn has_spans(&self) -> bool {
        !self.spans_by_label.is_empty()
    }

    /// Timestamp of the first sample
    #[must_use]
    pub fn start_time(&self) -> Option<f64> {
        self.samples.first().map(|s| s.timestamp)
    }

    fn push_span(&mut self, boundary: &SpanBoundary) {
        let span = Span::from(boundary);
        match self.spans_by_label.iter_mut().find(|(l, _)| *l == boundary.label) {
            Some((_, spans)) => spans.push(span),
            None => self.spans_by_label.push((boundary.label.clone(), vec![span])),
        }
    }

    fn push_child(&mut self, child: u32, sample: Sample) {
        match self.children.iter_mut().find(|(pid, _)| *pid == child) {
            Some((_, series)) => series.push(sample),
            None => self.children.push((child, vec![sample])),
        }
    }
}

/// Read and parse the artifact at `path`
///
/// # Errors
/// - [`ReadProfileError::Io`] if the file cannot be read
/// - [`ReadProfileError::Format`] on the first malformed line; nothing is
///   returned for the rest of the file
pub fn read_profile(path: impl AsRef<Path>) -> Result<ProfileData, ReadProfileError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|source| ReadProfileError::Io { path: path.to_path_buf(), source })?;
    Ok(parse_profile(path, &content)?)
}

/// Parse artifact `content`; `path` is only used to label the result and errors
///
/// # Errors
/// Returns [`FormatError`] for the first line with a known tag that does not
/// parse. Blank lines and unknown tags are skipped.
pub fn parse_profile(path: &Path, content: &str) -> Result<ProfileData, FormatError> {
    let mut data = ProfileData { path: path.to_path_buf(), ..ProfileData::default() };

    for (idx, line) in content.lines().enumerate() {
        let record = parse_line(line).map_err(|source| FormatError {
            path: path.to_path_buf(),
            line_number: idx + 1,
            line: line.to_string(),
            source,
        })?;

        match record {
            Some(Record::Sample(sample)) => data.samples.push(sample),
            Some(Record::SpanBoundary(boundary)) => data.push_span(&boundary),
            Some(Record::ChildSample(c)) => {
                data.push_child(c.child, Sample::new(c.memory_mb, c.timestamp));
            }
            // A second header (two runs sharing a name) keeps the first
            Some(Record::CommandLine(cmd)) => {
                data.command_line.get_or_insert(cmd);
            }
            None => {}
        }
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mprof_common::RecordError;

    fn parse(content: &str) -> Result<ProfileData, FormatError> {
        parse_profile(Path::new("mprofile_20240101120000.dat"), content)
    }

    #[test]
    fn test_parse_samples_and_spans() {
        let data = parse(
            "CMDLINE python3 train.py\n\
             MEM 12.500000 1000.0000\n\
             FUNC load 12.5 1000.0 13.0 1000.1\n\
             MEM 13.000000 1000.1000\n\
             FUNC step 13.0 1000.1 20.0 1000.5\n\
             FUNC load 20.0 1000.5 20.5 1000.6\n",
        )
        .unwrap();

        assert_eq!(data.command_line.as_deref(), Some("python3 train.py"));
        assert_eq!(data.samples, vec![Sample::new(12.5, 1000.0), Sample::new(13.0, 1000.1)]);

        let labels: Vec<&str> = data.spans_by_label.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["load", "step"]);
        let load = data.spans("load").unwrap();
        assert_eq!(load.len(), 2);
        assert_eq!(load[1].values(), [1000.5, 1000.6, 20.0, 20.5]);
    }

    #[test]
    fn test_samples_keep_file_order() {
        let data = parse("MEM 2.0 1000.5\nMEM 1.0 1000.0\n").unwrap();
        assert_eq!(data.samples[0].timestamp, 1000.5);
        assert_eq!(data.samples[1].timestamp, 1000.0);
    }

    #[test]
    fn test_child_series_grouped_by_pid() {
        let data = parse(
            "MEM 10.0 1.0\nCHLD 7 1.0 1.0\nCHLD 9 2.0 1.0\nMEM 11.0 1.1\nCHLD 7 1.5 1.1\n",
        )
        .unwrap();
        assert_eq!(data.children.len(), 2);
        assert_eq!(data.children[0].0, 7);
        assert_eq!(data.children[0].1, vec![Sample::new(1.0, 1.0), Sample::new(1.5, 1.1)]);
    }

    #[test]
    fn test_unknown_tags_and_blank_lines_skipped() {
        let data = parse("\nMEM 1.0 1.0\nGPU 3 4 5\n   \nMEM 2.0 2.0\n").unwrap();
        assert_eq!(data.samples.len(), 2);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse("MEM 1.0 1.0\nMEM abc 1.0\nMEM 2.0 2.0\n").unwrap_err();
        assert_eq!(err.line_number, 2);
        assert_eq!(err.line, "MEM abc 1.0");
        assert!(matches!(err.source, RecordError::InvalidNumber { .. }));
    }

    #[test]
    fn test_wrong_field_count_fails() {
        let err = parse("FUNC foo 1.0 2.0\n").unwrap_err();
        assert!(matches!(err.source, RecordError::FieldCount { .. }));
    }

    #[test]
    fn test_empty_artifact() {
        let data = parse("").unwrap();
        assert!(data.samples.is_empty());
        assert!(!data.has_spans());
        assert_eq!(data.start_time(), None);
    }
}
