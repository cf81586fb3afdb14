//! Profile index
//!
//! The artifacts of a directory, ordered by the start time embedded in their
//! names. Because the timestamp is fixed-width, lexical order of file names is
//! chronological order, so index 0 is the oldest run and -1 the newest.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info};
use mprof_common::{parse_line, Record};

use super::naming::{artifact_start_time, timestamp_sibling};
use crate::domain::IndexError;

/// Glob matching artifact names (not their `_ts` siblings)
const ARTIFACT_GLOB: &str = "mprofile_??????????????.dat";

/// One row of `mprof list`
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub index: usize,
    pub path: PathBuf,
    pub start_time: Option<NaiveDateTime>,
    pub command_line: Option<String>,
}

impl ProfileEntry {
    /// File name without directory, as shown to users
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}

/// Ordered artifacts of one directory
#[derive(Debug, Clone, Default)]
pub struct ProfileIndex {
    dir: PathBuf,
    profiles: Vec<PathBuf>,
}

impl ProfileIndex {
    /// Discover the artifacts in `dir`
    ///
    /// # Errors
    /// Returns [`IndexError::Scan`] if the directory cannot be searched
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref().to_path_buf();
        let scan_error = |reason: String| IndexError::Scan { dir: dir.clone(), reason };

        let escaped = glob::Pattern::escape(&dir.to_string_lossy());
        let pattern = Path::new(&escaped).join(ARTIFACT_GLOB);
        let paths = glob::glob(&pattern.to_string_lossy()).map_err(|e| scan_error(e.to_string()))?;

        let mut profiles = Vec::new();
        for entry in paths {
            profiles.push(entry.map_err(|e| scan_error(e.to_string()))?);
        }
        profiles.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        debug!("Found {} profiles in {}", profiles.len(), dir.display());
        Ok(Self { dir, profiles })
    }

    /// Artifacts, oldest first
    #[must_use]
    pub fn profiles(&self) -> &[PathBuf] {
        &self.profiles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Artifact at `index`; negative values count back from the newest
    ///
    /// # Errors
    /// Returns [`IndexError::OutOfRange`] outside `-len..len`
    pub fn get(&self, index: isize) -> Result<&Path, IndexError> {
        let len = self.profiles.len();
        let position = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index.unsigned_abs()).filter(|&i| i < len)
        };
        position
            .and_then(|i| self.profiles.get(i))
            .map(PathBuf::as_path)
            .ok_or(IndexError::OutOfRange { index, len })
    }

    /// The newest artifact, if any
    #[must_use]
    pub fn latest(&self) -> Option<&Path> {
        self.profiles.last().map(PathBuf::as_path)
    }

    /// Resolve a mix of file names and indices to a de-duplicated path list.
    ///
    /// A reference naming an existing file wins over its reading as an index.
    /// Each artifact is followed by its `_ts` sibling when one exists. Every
    /// reference is resolved before anything is returned, so one bad reference
    /// fails the whole batch.
    ///
    /// # Errors
    /// - [`IndexError::OutOfRange`] for an integer reference outside the index
    /// - [`IndexError::NotFound`] for anything else that names no file
    pub fn resolve<S: AsRef<str>>(&self, refs: &[S]) -> Result<Vec<PathBuf>, IndexError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for reference in refs {
            let base = self.resolve_one(reference.as_ref())?;
            for path in [timestamp_sibling(&base), base].into_iter().rev() {
                if !path.is_file() {
                    continue;
                }
                let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
                if seen.insert(key) {
                    resolved.push(path);
                }
            }
        }

        Ok(resolved)
    }

    /// Every artifact with its `_ts` sibling, for `mprof clean`
    ///
    /// # Errors
    /// Returns [`IndexError::NotFound`] if an artifact vanished since the scan
    pub fn resolve_all(&self) -> Result<Vec<PathBuf>, IndexError> {
        let refs: Vec<String> =
            self.profiles.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        self.resolve(&refs)
    }

    fn resolve_one(&self, reference: &str) -> Result<PathBuf, IndexError> {
        let direct = Path::new(reference);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        let in_dir = self.dir.join(reference);
        if in_dir.is_file() {
            return Ok(in_dir);
        }
        match reference.parse::<isize>() {
            Ok(index) => self.get(index).map(Path::to_path_buf),
            Err(_) => Err(IndexError::NotFound(reference.to_string())),
        }
    }

    /// Rows for `mprof list`: position, name, start time and command line
    #[must_use]
    pub fn entries(&self) -> Vec<ProfileEntry> {
        self.profiles
            .iter()
            .enumerate()
            .map(|(index, path)| ProfileEntry {
                index,
                path: path.clone(),
                start_time: artifact_start_time(path),
                command_line: read_command_line(path),
            })
            .collect()
    }
}

/// Command line from the artifact header, without parsing the whole file
fn read_command_line(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let first = BufReader::new(file).lines().next()?.ok()?;
    match parse_line(&first) {
        Ok(Some(Record::CommandLine(cmd))) => Some(cmd),
        _ => None,
    }
}

/// Delete `paths`, or only report them when `dry_run` is set.
///
/// Paths that disappeared since resolution are skipped.
///
/// # Errors
/// Returns the first deletion failure other than a missing file
pub fn remove_profiles(paths: &[PathBuf], dry_run: bool) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::with_capacity(paths.len());
    for path in paths {
        if dry_run {
            removed.push(path.clone());
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Removed {}", path.display());
                removed.push(path.clone());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} already gone", path.display());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
