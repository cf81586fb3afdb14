//! Chrome Trace Event export of memory profiles, viewable in Perfetto or chrome://tracing

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::ExportError;
use crate::recording::ProfileData;

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    name: String,
    cat: String,
    /// Phase: "C" = counter, "X" = complete, "M" = metadata
    ph: String,
    /// Timestamp in microseconds
    ts: f64,
    /// Duration in microseconds, complete events only
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    /// One trace process per artifact
    pid: u32,
    tid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

/// Chrome trace exporter for memory timelines
///
/// Each added profile becomes one trace process: `MEM` samples as a memory
/// counter, `CHLD` series as one counter per descendant, and `FUNC` spans as
/// complete events. Timestamps are relative to the profile's first sample.
#[derive(Debug, Default)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
    profiles: u32,
    samples: usize,
}

impl ChromeTraceExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every series and span of `data`
    pub fn add_profile(&mut self, data: &ProfileData) {
        let pid = self.profiles;
        self.profiles += 1;

        let origin = data
            .start_time()
            .or_else(|| {
                data.spans_by_label.first().and_then(|(_, s)| s.first()).map(|s| s.start_time)
            })
            .unwrap_or_default();
        let micros = |t: f64| ((t - origin) * 1_000_000.0).max(0.0);

        let name = data.path.file_name().map_or_else(
            || data.path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        self.events.push(metadata("process_name", pid, "name", &name));
        if let Some(cmd) = &data.command_line {
            self.events.push(metadata("process_labels", pid, "labels", cmd));
        }

        for sample in &data.samples {
            self.events.push(counter("memory", pid, micros(sample.timestamp), sample.memory_mb));
        }
        self.samples += data.samples.len();

        for (child, series) in &data.children {
            let name = format!("child {child}");
            for sample in series {
                self.events.push(counter(&name, pid, micros(sample.timestamp), sample.memory_mb));
            }
        }

        for (label, spans) in &data.spans_by_label {
            for span in spans {
                let mut args = HashMap::new();
                args.insert("start_mem".to_string(), serde_json::json!(span.start_mem));
                args.insert("end_mem".to_string(), serde_json::json!(span.end_mem));
                self.events.push(ChromeTraceEvent {
                    name: label.clone(),
                    cat: "function".to_string(),
                    ph: "X".to_string(),
                    ts: micros(span.start_time),
                    dur: Some(span.duration() * 1_000_000.0),
                    pid,
                    tid: 0,
                    args: Some(args),
                });
            }
        }
    }

    /// Export the trace to any writer (file, stdout, buffer, etc.)
    ///
    /// # Errors
    /// - [`ExportError::Empty`] when no added profile had a single sample
    /// - [`ExportError::Json`] if serialization or the write fails
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        if self.samples == 0 {
            return Err(ExportError::Empty);
        }
        let trace =
            ChromeTrace { trace_events: self.events.clone(), display_time_unit: "ms".to_string() };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    /// Export the trace to a new file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written
    pub fn export_to_file(&self, path: &Path) -> Result<(), ExportError> {
        if self.samples == 0 {
            return Err(ExportError::Empty);
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.export(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Get the number of events collected
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

fn counter(name: &str, pid: u32, ts: f64, memory_mb: f64) -> ChromeTraceEvent {
    let mut args = HashMap::new();
    args.insert("MiB".to_string(), serde_json::json!(memory_mb));
    ChromeTraceEvent {
        name: name.to_string(),
        cat: "memory".to_string(),
        ph: "C".to_string(),
        ts,
        dur: None,
        pid,
        tid: 0,
        args: Some(args),
    }
}

fn metadata(name: &str, pid: u32, key: &str, value: &str) -> ChromeTraceEvent {
    let mut args = HashMap::new();
    args.insert(key.to_string(), serde_json::json!(value));
    ChromeTraceEvent {
        name: name.to_string(),
        cat: String::new(),
        ph: "M".to_string(),
        ts: 0.0,
        dur: None,
        pid,
        tid: 0,
        args: Some(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::reader::parse_profile;
    use std::path::Path;

    fn profile(content: &str) -> ProfileData {
        parse_profile(Path::new("mprofile_20240101120000.dat"), content).unwrap()
    }

    #[test]
    fn test_counter_and_span_events() {
        let mut exporter = ChromeTraceExporter::new();
        exporter.add_profile(&profile(
            "CMDLINE ./app\nMEM 12.5 1000.0\nMEM 13.0 1000.5\nFUNC foo 12.5 1000.0 13.0 1000.5\n",
        ));
        // process_name, process_labels, 2 counters, 1 span
        assert_eq!(exporter.event_count(), 5);

        let mut buffer = Vec::new();
        exporter.export(&mut buffer).unwrap();
        let parsed: JsonValue = serde_json::from_slice(&buffer).unwrap();
        let events = parsed["traceEvents"].as_array().unwrap();

        let counters: Vec<_> = events.iter().filter(|e| e["ph"] == "C").collect();
        assert_eq!(counters[0]["ts"], 0.0);
        assert_eq!(counters[1]["ts"], 500_000.0);
        assert_eq!(counters[1]["args"]["MiB"], 13.0);

        let span = events.iter().find(|e| e["ph"] == "X").unwrap();
        assert_eq!(span["name"], "foo");
        assert_eq!(span["dur"], 500_000.0);
    }

    #[test]
    fn test_export_without_samples_fails() {
        let mut exporter = ChromeTraceExporter::new();
        exporter.add_profile(&profile("CMDLINE ./app\n"));
        assert!(matches!(exporter.export(Vec::new()), Err(ExportError::Empty)));
    }
}
