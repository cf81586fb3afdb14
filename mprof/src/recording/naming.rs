//! Artifact file names
//!
//! One artifact per run, named from the run's start time at second resolution.
//! Two runs started within the same second therefore share a name.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// File name prefix shared by every artifact
pub const ARTIFACT_PREFIX: &str = "mprofile_";

/// File extension of artifacts
pub const ARTIFACT_EXTENSION: &str = ".dat";

/// Suffix inserted before the extension for the auxiliary timestamp artifact
pub const TIMESTAMP_SUFFIX: &str = "_ts";

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// `mprofile_<YYYYMMDDHHMMSS>.dat` for a run started at `start`
#[must_use]
pub fn artifact_name<Tz: TimeZone>(start: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{ARTIFACT_PREFIX}{}{ARTIFACT_EXTENSION}", start.format(STAMP_FORMAT))
}

/// Artifact name for a run starting now, in local time
#[must_use]
pub fn artifact_name_now() -> String {
    artifact_name(&Local::now())
}

/// Start time embedded in an artifact's file name, if it has the expected shape
#[must_use]
pub fn artifact_start_time(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(ARTIFACT_PREFIX)?.strip_suffix(ARTIFACT_EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()
}

/// The paired `_ts` artifact of `path`: `mprofile_X.dat` → `mprofile_X_ts.dat`
#[must_use]
pub fn timestamp_sibling(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension =
        path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    path.with_file_name(format!("{stem}{TIMESTAMP_SUFFIX}{extension}"))
}
