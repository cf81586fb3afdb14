//! Resident memory readings from the `/proc` filesystem
//!
//! [`MemoryProbe`] is the seam between the sampling loop and the operating
//! system. [`ProcFs`] is the Linux implementation; tests substitute their own.

#![allow(unsafe_code)] // sysconf() requires unsafe

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::domain::{Bytes, Pid, ProbeError};

use super::process_tree;

/// Page size assumed when `sysconf` cannot report one
const FALLBACK_PAGE_SIZE: u64 = 4096;

/// Source of liveness and memory information for processes
pub trait MemoryProbe {
    /// Whether `pid` is still running. Zombies count as terminated.
    ///
    /// Must not reap the process: exit status collection belongs to whoever
    /// launched it.
    fn is_alive(&self, pid: Pid) -> bool;

    /// Current resident set size of `pid`
    ///
    /// # Errors
    /// Returns [`ProbeError`] when the process vanished or its counters are unreadable
    fn resident_bytes(&self, pid: Pid) -> Result<Bytes, ProbeError>;

    /// Every descendant of `pid` at this instant (best-effort snapshot)
    fn descendants(&self, pid: Pid) -> Vec<Pid>;
}

/// [`MemoryProbe`] backed by `/proc`
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    page_size: u64,
}

impl ProcFs {
    /// Probe the live `/proc` of this host
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Probe a `/proc`-shaped directory tree (used by tests)
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), page_size: page_size() }
    }

    fn pid_file(&self, pid: Pid, file: &str) -> PathBuf {
        self.root.join(pid.0.to_string()).join(file)
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for ProcFs {
    fn is_alive(&self, pid: Pid) -> bool {
        process_tree::read_stat(&self.root, pid).is_some_and(|stat| !stat.is_terminated())
    }

    fn resident_bytes(&self, pid: Pid) -> Result<Bytes, ProbeError> {
        let content = fs::read_to_string(self.pid_file(pid, "statm")).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ProbeError::Vanished(pid)
            } else {
                ProbeError::Unreadable { pid, file: "statm", reason: e.to_string() }
            }
        })?;

        let pages = parse_statm_resident(&content).ok_or_else(|| ProbeError::Unreadable {
            pid,
            file: "statm",
            reason: format!("unexpected content '{}'", content.trim()),
        })?;

        Ok(Bytes(pages.saturating_mul(self.page_size)))
    }

    fn descendants(&self, pid: Pid) -> Vec<Pid> {
        process_tree::descendants(&self.root, pid)
    }
}

/// Resident page count from `/proc/<pid>/statm`.
///
/// Format: `size resident shared text lib data dt`, all in pages.
fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

fn page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).ok().filter(|&s| s > 0).unwrap_or(FALLBACK_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_process(root: &Path, pid: u32, state: char, ppid: u32, resident_pages: u64) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), format!("{pid} (fake) {state} {ppid} 0 0")).unwrap();
        fs::write(dir.join("statm"), format!("1000 {resident_pages} 10 1 0 50 0\n")).unwrap();
    }

    #[test]
    fn test_parse_statm() {
        assert_eq!(parse_statm_resident("2391 512 300 1 0 150 0\n"), Some(512));
        assert_eq!(parse_statm_resident("2391"), None);
        assert_eq!(parse_statm_resident("a b c"), None);
    }

    #[test]
    fn test_page_size_is_sane() {
        let size = page_size();
        assert!(size >= 4096);
        assert!(size.is_power_of_two());
    }

    #[test]
    fn test_resident_bytes_from_fake_proc() {
        let root = TempDir::new().unwrap();
        fake_process(root.path(), 42, 'S', 1, 256);
        let probe = ProcFs::with_root(root.path());

        let bytes = probe.resident_bytes(Pid(42)).unwrap();
        assert_eq!(bytes, Bytes(256 * probe.page_size));
        assert!(probe.is_alive(Pid(42)));
    }

    #[test]
    fn test_zombie_is_not_alive() {
        let root = TempDir::new().unwrap();
        fake_process(root.path(), 42, 'Z', 1, 0);
        assert!(!ProcFs::with_root(root.path()).is_alive(Pid(42)));
    }

    #[test]
    fn test_missing_process_is_vanished() {
        let root = TempDir::new().unwrap();
        let probe = ProcFs::with_root(root.path());
        assert!(!probe.is_alive(Pid(42)));
        assert!(matches!(probe.resident_bytes(Pid(42)), Err(ProbeError::Vanished(Pid(42)))));
    }

    #[test]
    fn test_malformed_statm_is_unreadable() {
        let root = TempDir::new().unwrap();
        fake_process(root.path(), 42, 'S', 1, 0);
        fs::write(root.path().join("42").join("statm"), "garbage").unwrap();

        let err = ProcFs::with_root(root.path()).resident_bytes(Pid(42)).unwrap_err();
        assert!(matches!(err, ProbeError::Unreadable { file: "statm", .. }));
    }

    #[test]
    fn test_self_process_has_memory() {
        let probe = ProcFs::new();
        let me = Pid(std::process::id());
        assert!(probe.is_alive(me));
        assert!(probe.resident_bytes(me).unwrap().0 > 0);
    }
}
