//! Append-only profile writer
//!
//! Each record is formatted into a complete line and handed to the kernel in a
//! single `write` on an unbuffered file handle, so a line that was written
//! survives the death of this process and a crash never leaves more than one
//! partial line behind.
//!
//! The artifact is opened in append mode and never truncated. A second writer
//! on the same path (the Python instrumentation, or another run started in the
//! same second) interleaves its lines with ours in no guaranteed order.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use mprof_common::Record;

/// Destination for records produced while sampling
pub trait RecordSink {
    /// Persist one record
    ///
    /// # Errors
    /// Returns an error if the record could not be persisted
    fn write_record(&mut self, record: &Record) -> io::Result<()>;
}

/// In-memory sink, handy for tests and dry runs
impl RecordSink for Vec<Record> {
    fn write_record(&mut self, record: &Record) -> io::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Writer owning the artifact file handle for the lifetime of a run
#[derive(Debug)]
pub struct ProfileWriter {
    path: PathBuf,
    file: File,
}

impl ProfileWriter {
    /// Open `path` for appending, creating it if needed
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a line
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub fn write(&mut self, record: &Record) -> io::Result<()> {
        let mut line = record.to_string();
        line.push('\n');
        self.file.write_all(line.as_bytes())
    }

    /// Write the `CMDLINE` header naming the profiled command
    ///
    /// # Errors
    /// Returns an error if the write fails
    pub fn write_command_line(&mut self, command_line: &str) -> io::Result<()> {
        self.write(&Record::CommandLine(command_line.to_string()))
    }

    /// Flush file data to stable storage and close the artifact
    ///
    /// # Errors
    /// Returns an error if syncing fails
    pub fn close(self) -> io::Result<()> {
        self.file.sync_data()
    }
}

impl RecordSink for ProfileWriter {
    fn write_record(&mut self, record: &Record) -> io::Result<()> {
        self.write(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mprof_common::Sample;
    use tempfile::TempDir;

    #[test]
    fn test_each_write_is_visible_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mprofile_20240101000000.dat");
        let mut writer = ProfileWriter::open(&path).unwrap();

        writer.write_command_line("sleep 1").unwrap();
        writer.write(&Sample::new(1.5, 100.0).into()).unwrap();

        // No flush or close: the lines are already in the file
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "CMDLINE sleep 1\nMEM 1.500000 100.0000\n");
        writer.close().unwrap();
    }

    #[test]
    fn test_open_appends_instead_of_truncating() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.dat");

        let mut first = ProfileWriter::open(&path).unwrap();
        first.write(&Sample::new(1.0, 1.0).into()).unwrap();
        let mut second = ProfileWriter::open(&path).unwrap();
        second.write(&Sample::new(2.0, 2.0).into()).unwrap();
        first.write(&Sample::new(3.0, 3.0).into()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("MEM 1.000000 1.0000\n"));
    }

    #[test]
    fn test_command_line_with_newline_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.dat");
        let command = crate::profiling::launcher::format_command_line(&[
            "sh".to_string(),
            "-c".to_string(),
            "echo hi\nFUNC done".to_string(),
        ]);

        let mut writer = ProfileWriter::open(&path).unwrap();
        assert_eq!(writer.path(), path.as_path());
        writer.write_command_line(&command).unwrap();
        writer.write(&Sample::new(1.0, 1.0).into()).unwrap();
        writer.close().unwrap();

        let data = crate::recording::read_profile(&path).unwrap();
        assert_eq!(data.command_line.as_deref(), Some(r"sh -c 'echo hi\nFUNC done'"));
        assert_eq!(data.samples.len(), 1);
        assert!(!data.has_spans());
    }

    #[test]
    fn test_vec_sink_collects_records() {
        let mut sink: Vec<Record> = Vec::new();
        sink.write_record(&Sample::new(1.0, 2.0).into()).unwrap();
        assert_eq!(sink, vec![Record::Sample(Sample::new(1.0, 2.0))]);
    }
}
