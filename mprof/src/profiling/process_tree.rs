//! Process tree discovery
//!
//! Builds a parent → children snapshot from `/proc/<pid>/stat` and walks it to
//! find every descendant of a process. The snapshot is best-effort: processes
//! may start or exit while it is taken, and nothing here treats that as an
//! error.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;

use crate::domain::Pid;

/// Fields of `/proc/<pid>/stat` the profiler cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub pid: Pid,
    pub comm: String,
    pub state: char,
    pub parent: Pid,
}

impl ProcStat {
    /// Zombie (`Z`) and dead (`X`/`x`) processes no longer own memory
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, 'Z' | 'X' | 'x')
    }
}

/// Parse a `/proc/<pid>/stat` line.
///
/// Format: `pid (comm) state ppid ...`. The command name may itself contain
/// spaces and parentheses, so fields after it are located from the last `)`.
#[must_use]
pub fn parse_stat(stat_line: &str) -> Option<ProcStat> {
    let open = stat_line.find('(')?;
    let close = stat_line.rfind(')')?;
    if open >= close {
        return None;
    }

    let pid = stat_line[..open].trim().parse::<u32>().ok()?;
    let comm = stat_line[open + 1..close].to_string();

    let mut rest = stat_line[close + 1..].split_whitespace();
    let state = rest.next()?.chars().next()?;
    let parent = rest.next()?.parse::<u32>().ok()?;

    Some(ProcStat { pid: Pid(pid), comm, state, parent: Pid(parent) })
}

/// Read and parse `<proc_root>/<pid>/stat`
#[must_use]
pub fn read_stat(proc_root: &Path, pid: Pid) -> Option<ProcStat> {
    let content = fs::read_to_string(proc_root.join(pid.0.to_string()).join("stat")).ok()?;
    parse_stat(&content)
}

/// Snapshot the parent → children relation of every visible process
fn children_by_parent(proc_root: &Path) -> HashMap<Pid, Vec<Pid>> {
    let Ok(entries) = fs::read_dir(proc_root) else {
        return HashMap::new();
    };

    let mut tree: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for entry in entries.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };
        // Processes that exit mid-scan simply drop out of the snapshot
        if let Some(stat) = read_stat(proc_root, Pid(pid)) {
            tree.entry(stat.parent).or_default().push(stat.pid);
        }
    }

    for children in tree.values_mut() {
        children.sort_unstable();
    }
    tree
}

/// All descendants of `root` (children, grandchildren, ...), breadth-first.
///
/// `root` itself is not included.
#[must_use]
pub fn descendants(proc_root: &Path, root: Pid) -> Vec<Pid> {
    let tree = children_by_parent(proc_root);

    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(parent) = queue.pop_front() {
        for &child in tree.get(&parent).into_iter().flatten() {
            // Guard against pid reuse producing a cycle in a racy snapshot
            if child != root && !found.contains(&child) {
                found.push(child);
                queue.push_back(child);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_process(root: &Path, pid: u32, comm: &str, state: char, ppid: u32) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), format!("{pid} ({comm}) {state} {ppid} {pid} {pid} 0 -1\n"))
            .unwrap();
    }

    #[test]
    fn test_parse_stat() {
        let stat = parse_stat("1234 (my-app) S 1 1234 1234 0 -1 4194304").unwrap();
        assert_eq!(stat.pid, Pid(1234));
        assert_eq!(stat.comm, "my-app");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.parent, Pid(1));
        assert!(!stat.is_terminated());
    }

    #[test]
    fn test_parse_stat_with_parens_in_comm() {
        // Command names can contain parentheses and spaces
        let stat = parse_stat("1234 (app (v2) x) Z 99 1234").unwrap();
        assert_eq!(stat.comm, "app (v2) x");
        assert_eq!(stat.parent, Pid(99));
        assert!(stat.is_terminated());
    }

    #[test]
    fn test_parse_stat_rejects_garbage() {
        assert!(parse_stat("").is_none());
        assert!(parse_stat("1234 my-app S 1").is_none());
        assert!(parse_stat("abc (x) S 1").is_none());
    }

    #[test]
    fn test_descendants_walks_whole_tree() {
        let proc_root = TempDir::new().unwrap();
        let root = proc_root.path();
        fake_process(root, 100, "root", 'S', 1);
        fake_process(root, 101, "child-a", 'S', 100);
        fake_process(root, 102, "child-b", 'R', 100);
        fake_process(root, 103, "grandchild", 'S', 101);
        fake_process(root, 200, "unrelated", 'S', 1);
        // Non-numeric entries in /proc are ignored
        fs::create_dir_all(root.join("self")).unwrap();

        let found = descendants(root, Pid(100));
        assert_eq!(found, vec![Pid(101), Pid(102), Pid(103)]);
    }

    #[test]
    fn test_descendants_of_leaf_is_empty() {
        let proc_root = TempDir::new().unwrap();
        fake_process(proc_root.path(), 100, "root", 'S', 1);
        assert!(descendants(proc_root.path(), Pid(100)).is_empty());
    }

    #[test]
    fn test_descendants_self_process() {
        // The test binary normally has no children; the scan must still succeed
        let found = descendants(Path::new("/proc"), Pid(std::process::id()));
        assert!(!found.contains(&Pid(std::process::id())));
    }
}
