//! # Profile Record Grammar
//!
//! Defines the line-oriented records stored in a profile artifact
//! (`mprofile_<YYYYMMDDHHMMSS>.dat`). Every producer (the sampler, an
//! instrumented child runtime) and every consumer (reader, index, plot) goes
//! through the types in this crate, so the text format has exactly one
//! definition.
//!
//! ## Line Grammar
//!
//! One record per line, whitespace-separated tokens:
//!
//! ```text
//! CMDLINE <command line, rest of the line>
//! MEM <mem:6dp> <timestamp:4dp>
//! CHLD <pid> <mem:6dp> <timestamp:4dp>
//! FUNC <name> <mem_start> <t_start> <mem_end> <t_end>
//! ```
//!
//! Memory is in megabytes, timestamps are POSIX seconds.
//!
//! ## Key Types
//!
//! - [`Record`] - Tagged variant over every record kind
//! - [`Sample`] - One `MEM` reading
//! - [`SpanBoundary`] - One `FUNC` entry/exit bracket
//! - [`ChildSample`] - One `CHLD` reading for a descendant process
//! - [`parse_line`] - Text to [`Record`], skipping unknown tags

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// Tags
// ============================================================================

/// Tag of a coarse memory sample line
pub const TAG_MEM: &str = "MEM";

/// Tag of a function entry/exit bracket line
pub const TAG_FUNC: &str = "FUNC";

/// Tag of a per-descendant memory sample line (multiprocess mode)
pub const TAG_CHLD: &str = "CHLD";

/// Tag of the command line header written when a run starts
pub const TAG_CMDLINE: &str = "CMDLINE";

/// Decimal digits used when writing memory values of `MEM`/`CHLD` lines
pub const MEMORY_PRECISION: usize = 6;

/// Decimal digits used when writing timestamps and `FUNC` values
pub const TIME_PRECISION: usize = 4;

// ============================================================================
// Record Types
// ============================================================================

/// A single memory reading of the profiled process (tree)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Resident memory in megabytes, always >= 0
    pub memory_mb: f64,
    /// Wall-clock read time, POSIX seconds
    pub timestamp: f64,
}

impl Sample {
    #[must_use]
    pub fn new(memory_mb: f64, timestamp: f64) -> Self {
        Self { memory_mb, timestamp }
    }
}

/// Memory reading of one descendant process, written in multiprocess mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildSample {
    /// Process ID of the descendant
    pub child: u32,
    /// Resident memory in megabytes
    pub memory_mb: f64,
    /// Wall-clock read time, POSIX seconds
    pub timestamp: f64,
}

/// Function entry/exit bracket with memory readings at both ends
///
/// Written by an instrumented child runtime, never by the sampler itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanBoundary {
    /// Function name, written as a single token
    pub label: String,
    pub start_mem: f64,
    pub start_time: f64,
    pub end_mem: f64,
    pub end_time: f64,
}

impl SpanBoundary {
    /// Duration of the bracket in seconds
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Any record that can appear in a profile artifact
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// `CMDLINE` header
    CommandLine(String),
    /// `MEM` line
    Sample(Sample),
    /// `CHLD` line
    ChildSample(ChildSample),
    /// `FUNC` line
    SpanBoundary(SpanBoundary),
}

impl Record {
    /// Tag written at the start of this record's line
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Record::CommandLine(_) => TAG_CMDLINE,
            Record::Sample(_) => TAG_MEM,
            Record::ChildSample(_) => TAG_CHLD,
            Record::SpanBoundary(_) => TAG_FUNC,
        }
    }
}

impl From<Sample> for Record {
    fn from(sample: Sample) -> Self {
        Record::Sample(sample)
    }
}

impl From<ChildSample> for Record {
    fn from(sample: ChildSample) -> Self {
        Record::ChildSample(sample)
    }
}

impl From<SpanBoundary> for Record {
    fn from(span: SpanBoundary) -> Self {
        Record::SpanBoundary(span)
    }
}

// ============================================================================
// Serialization
// ============================================================================

impl fmt::Display for Record {
    /// Formats the record as one artifact line, without the trailing newline.
    ///
    /// Control characters in a command line are escaped and whitespace in a
    /// span label becomes `_`, so every record stays one parseable line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const M: usize = MEMORY_PRECISION;
        const T: usize = TIME_PRECISION;
        write!(f, "{} ", self.tag())?;
        match self {
            Record::CommandLine(cmd) => {
                for c in cmd.chars() {
                    if c.is_control() {
                        write!(f, "{}", c.escape_default())?;
                    } else {
                        f.write_char(c)?;
                    }
                }
                Ok(())
            }
            Record::Sample(s) => write!(f, "{:.M$} {:.T$}", s.memory_mb, s.timestamp),
            Record::ChildSample(c) => {
                write!(f, "{} {:.M$} {:.T$}", c.child, c.memory_mb, c.timestamp)
            }
            Record::SpanBoundary(b) => write!(
                f,
                "{} {:.T$} {:.T$} {:.T$} {:.T$}",
                label_token(&b.label),
                b.start_mem,
                b.start_time,
                b.end_mem,
                b.end_time
            ),
        }
    }
}

/// A span label as one non-empty token
fn label_token(label: &str) -> Cow<'_, str> {
    if label.is_empty() {
        Cow::Borrowed("_")
    } else if label.contains(char::is_whitespace) {
        Cow::Owned(label.replace(char::is_whitespace, "_"))
    } else {
        Cow::Borrowed(label)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Why a line with a known tag could not be parsed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("{tag} record expects {expected} fields, found {found}")]
    FieldCount { tag: &'static str, expected: usize, found: usize },

    #[error("{tag} record has a non-numeric {field}: '{value}'")]
    InvalidNumber { tag: &'static str, field: &'static str, value: String },

    #[error("{tag} record has negative memory {value}")]
    NegativeMemory { tag: &'static str, value: f64 },

    #[error("FUNC record for '{label}' ends ({end}) before it starts ({start})")]
    SpanOrder { label: String, start: f64, end: f64 },

    #[error("not a known record: '{0}'")]
    Unrecognized(String),
}

/// Parse one artifact line.
///
/// Returns `Ok(None)` for blank lines and lines whose tag is unknown, so
/// artifacts containing newer record kinds stay readable.
///
/// # Errors
/// Returns [`RecordError`] when a known tag has the wrong number of fields,
/// a non-numeric (or non-finite) number, negative memory, or a `FUNC`
/// bracket that ends before it starts.
pub fn parse_line(line: &str) -> Result<Option<Record>, RecordError> {
    let trimmed = line.trim();
    let Some(tag) = trimmed.split_whitespace().next() else {
        return Ok(None);
    };

    match tag {
        TAG_CMDLINE => {
            let rest = trimmed[TAG_CMDLINE.len()..].trim_start();
            Ok(Some(Record::CommandLine(rest.to_string())))
        }
        TAG_MEM => {
            let fields = fields(trimmed, TAG_MEM, 3)?;
            let memory_mb = memory(TAG_MEM, "memory", fields[1])?;
            let timestamp = number(TAG_MEM, "timestamp", fields[2])?;
            Ok(Some(Record::Sample(Sample { memory_mb, timestamp })))
        }
        TAG_CHLD => {
            let fields = fields(trimmed, TAG_CHLD, 4)?;
            let child = fields[1].parse::<u32>().map_err(|_| RecordError::InvalidNumber {
                tag: TAG_CHLD,
                field: "pid",
                value: fields[1].to_string(),
            })?;
            let memory_mb = memory(TAG_CHLD, "memory", fields[2])?;
            let timestamp = number(TAG_CHLD, "timestamp", fields[3])?;
            Ok(Some(Record::ChildSample(ChildSample { child, memory_mb, timestamp })))
        }
        TAG_FUNC => {
            let fields = fields(trimmed, TAG_FUNC, 6)?;
            let span = SpanBoundary {
                label: fields[1].to_string(),
                start_mem: memory(TAG_FUNC, "start memory", fields[2])?,
                start_time: number(TAG_FUNC, "start time", fields[3])?,
                end_mem: memory(TAG_FUNC, "end memory", fields[4])?,
                end_time: number(TAG_FUNC, "end time", fields[5])?,
            };
            if span.end_time < span.start_time {
                return Err(RecordError::SpanOrder {
                    label: span.label,
                    start: span.start_time,
                    end: span.end_time,
                });
            }
            Ok(Some(Record::SpanBoundary(span)))
        }
        _ => Ok(None),
    }
}

impl FromStr for Record {
    type Err = RecordError;

    /// Strict variant of [`parse_line`]: unknown tags are an error here
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s)?.ok_or_else(|| RecordError::Unrecognized(s.trim().to_string()))
    }
}

fn fields<'a>(
    line: &'a str,
    tag: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, RecordError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() == expected {
        Ok(fields)
    } else {
        Err(RecordError::FieldCount { tag, expected, found: fields.len() })
    }
}

fn number(tag: &'static str, field: &'static str, raw: &str) -> Result<f64, RecordError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(RecordError::InvalidNumber { tag, field, value: raw.to_string() }),
    }
}

fn memory(tag: &'static str, field: &'static str, raw: &str) -> Result<f64, RecordError> {
    let value = number(tag, field, raw)?;
    if value < 0.0 {
        return Err(RecordError::NegativeMemory { tag, value });
    }
    Ok(value)
}
