//! Resolve an attach target (PID or process name) to a running process.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::domain::Pid;
use crate::profiling::launcher::format_command_line;
use crate::profiling::process_tree::read_stat;

/// Result of process lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub command: String,
    pub exe_path: Option<PathBuf>,
}

/// Resolve `target`: a numeric PID is taken as-is, anything else is looked up
/// by name.
///
/// # Errors
/// Returns an error if the PID does not exist or the name is not unique
pub fn resolve_attach_target(target: &str) -> Result<ProcessInfo> {
    if let Ok(pid) = target.parse::<u32>() {
        let stat = read_stat(Path::new("/proc"), Pid(pid)).with_context(|| {
            format!(
                "Process {pid} not found.\n\n\
                 Is the process still running? Check with: ps -p {pid}"
            )
        })?;
        return Ok(ProcessInfo {
            pid: stat.pid,
            command: stat.comm,
            exe_path: fs::read_link(format!("/proc/{pid}/exe")).ok(),
        });
    }
    find_process_by_name(target)
}

/// Find a process by name.
///
/// Matches against the command name from `/proc/<pid>/stat` and the executable
/// basename from `/proc/<pid>/exe`. mprof itself is never a candidate.
///
/// # Errors
/// - No processes found
/// - Multiple processes found (ambiguous)
pub fn find_process_by_name(name: &str) -> Result<ProcessInfo> {
    find_process_in(Path::new("/proc"), name, Pid(std::process::id()))
}

fn find_process_in(proc_root: &Path, name: &str, own_pid: Pid) -> Result<ProcessInfo> {
    let proc_dir = fs::read_dir(proc_root)
        .with_context(|| format!("Failed to read {}", proc_root.display()))?;

    let mut matches: Vec<ProcessInfo> = Vec::new();
    for entry in proc_dir.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        let pid = Pid(pid);
        if pid == own_pid {
            continue;
        }
        let Some(stat) = read_stat(proc_root, pid) else {
            continue;
        };
        if stat.is_terminated() {
            continue;
        }
        let exe_path = fs::read_link(entry.path().join("exe")).ok();

        if is_match(&stat.comm, exe_path.as_deref(), name) {
            matches.push(ProcessInfo { pid, command: stat.comm, exe_path });
        }
    }
    matches.sort_by_key(|m| m.pid);

    match matches.len() {
        0 => bail!(
            "No process matching '{name}' found.\n\
             Check running processes with: ps aux | grep {name}"
        ),
        1 => Ok(matches.remove(0)),
        _ => {
            let list: Vec<String> =
                matches.iter().map(|m| format!("  {} ({})", m.pid.0, m.command)).collect();
            bail!(
                "Multiple processes match '{name}':\n{}\n\n\
                 Specify the PID explicitly: mprof attach <PID>",
                list.join("\n")
            )
        }
    }
}

/// Command line of a running process from `/proc/<pid>/cmdline`, falling back
/// to its command name for kernel threads and processes we cannot inspect
#[must_use]
pub fn read_command_line(pid: Pid, fallback: &str) -> String {
    fs::read(format!("/proc/{}/cmdline", pid.0))
        .ok()
        .map(|raw| parse_cmdline(&raw))
        .filter(|args| !args.is_empty())
        .map_or_else(|| fallback.to_string(), |args| format_command_line(&args))
}

/// Split NUL-separated `cmdline` content into arguments
fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

/// Check if process matches the search pattern.
fn is_match(command: &str, exe_path: Option<&Path>, pattern: &str) -> bool {
    let exe_basename = exe_path.and_then(Path::file_name).and_then(|n| n.to_str()).unwrap_or("");

    let pattern_basename =
        Path::new(pattern).file_name().and_then(|n| n.to_str()).unwrap_or(pattern);

    command == pattern_basename
        || exe_basename == pattern_basename
        || command.contains(pattern)
        || (!exe_basename.is_empty() && exe_basename.contains(pattern))
}
