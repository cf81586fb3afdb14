//! Pre-flight checks for mprof
//!
//! Validates that process memory can be observed before a run starts, so
//! failures surface as clear messages instead of an empty artifact.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::domain::Pid;

/// Checks needed before launching a program
///
/// # Errors
/// Returns an error if `/proc` is not usable on this host
pub fn run_preflight_checks() -> Result<()> {
    check_proc_mounted(Path::new("/proc"))
}

/// Check that `proc_root` exposes per-process memory counters
///
/// # Errors
/// Returns an error if `<proc_root>/self/statm` cannot be read
pub fn check_proc_mounted(proc_root: &Path) -> Result<()> {
    let statm = proc_root.join("self").join("statm");
    std::fs::read_to_string(&statm).with_context(|| {
        format!(
            "Cannot read {}\n\n\
             mprof reads memory usage from /proc; make sure it is mounted.",
            statm.display()
        )
    })?;
    Ok(())
}

/// Check if the target process exists
///
/// # Errors
/// Returns an error if there is no `/proc/<pid>` entry
pub fn check_process_exists(pid: Pid) -> Result<()> {
    let pid = pid.0;
    if !Path::new(&format!("/proc/{pid}")).exists() {
        bail!(
            "Process {pid} not found.\n\n\
             Is the process still running? Check with: ps -p {pid}"
        );
    }
    Ok(())
}

/// Check if we can read the process's memory counters
///
/// # Errors
/// Returns an error carrying the OS reason (e.g. "Permission denied")
pub fn check_proc_access(pid: Pid) -> Result<()> {
    let pid = pid.0;
    let statm_path = format!("/proc/{pid}/statm");
    std::fs::read_to_string(&statm_path).with_context(|| {
        format!(
            "Cannot read {statm_path}\n\n\
             This usually means:\n\
             - The process doesn't exist (check: ps -p {pid})\n\
             - Permission denied (run as the process owner or with sudo)"
        )
    })?;
    Ok(())
}

/// Whether `err` was caused by the OS refusing access
///
/// Only the error chain is inspected, never the message text, so hints that
/// mention permissions do not count.
#[must_use]
pub fn is_permission_denied(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::PermissionDenied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proc_is_mounted() {
        assert!(run_preflight_checks().is_ok());
    }

    #[test]
    fn test_missing_proc_root() {
        let err = check_proc_mounted(Path::new("/nonexistent/proc")).unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }

    #[test]
    fn test_process_not_found() {
        let result = check_process_exists(Pid(999_999_999));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_own_process_is_accessible() {
        let me = Pid(std::process::id());
        assert!(check_process_exists(me).is_ok());
        assert!(check_proc_access(me).is_ok());
    }

    #[test]
    fn test_vanished_process_is_not_permission_denied() {
        let err = check_proc_access(Pid(999_999_999)).unwrap_err();
        assert!(format!("{err:#}").contains("Permission denied"));
        assert!(!is_permission_denied(&err));
    }

    #[test]
    fn test_permission_denied_found_in_chain() {
        let err = anyhow::Error::from(io::Error::from(io::ErrorKind::PermissionDenied))
            .context("Cannot read /proc/1/statm");
        assert!(is_permission_denied(&err));
        assert!(!is_permission_denied(&anyhow::anyhow!("permission denied")));
    }
}
