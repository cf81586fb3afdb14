//! Structured error types for mprof
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;

use mprof_common::RecordError;
use thiserror::Error;

use super::types::Pid;

/// The target process could not be started. Fatal: the run aborts before an
/// artifact is created.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Cannot launch an empty command")]
    EmptyCommand,

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single memory read failed.
///
/// For descendants this is transient (the process exited between discovery and
/// read) and is absorbed as a zero contribution. For the root process it means
/// the target is gone.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Process {0} vanished")]
    Vanished(Pid),

    #[error("Failed to read /proc/{}/{file}: {reason}", .pid.0)]
    Unreadable { pid: Pid, file: &'static str, reason: String },
}

/// A persisted artifact line does not match the record grammar
#[derive(Error, Debug)]
#[error("{}:{line_number}: malformed record '{line}': {source}", .path.display())]
pub struct FormatError {
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    pub line: String,
    #[source]
    pub source: RecordError,
}

#[derive(Error, Debug)]
pub enum ReadProfileError {
    #[error("Failed to read profile {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// A profile reference (index or filename) does not resolve to a file
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Profile index {index} out of range ({len} profiles found)")]
    OutOfRange { index: isize, len: usize },

    #[error("No profile matching '{0}' found")]
    NotFound(String),

    #[error("Failed to scan {} for profiles: {reason}", .dir.display())]
    Scan { dir: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export: no samples in any profile")]
    Empty,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
