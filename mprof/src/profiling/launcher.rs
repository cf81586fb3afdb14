//! Process handle acquisition
//!
//! Turns a [`Target`] into a live [`ProcessHandle`]: either by launching a
//! command, optionally rewritten to run under the Python `memory_profiler`
//! instrumentation, or by attaching to a process that is already running.

use std::path::Path;
use std::process::{Child, Command, ExitStatus};

use log::{debug, info};

use crate::domain::{LaunchError, Pid};

/// What to profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Launch this command line (program followed by its arguments)
    Launch(Vec<String>),
    /// Observe an already running process
    Attach(Pid),
}

/// Whether a launched command runs under the Python instrumentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PythonMode {
    /// Instrument when the program is a `.py` script
    #[default]
    Auto,
    /// Always instrument
    Force,
    /// Never instrument
    Disabled,
}

/// Options for launching a target command
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub python: PythonMode,
    /// Interpreter inserted in front of scripts that do not name one
    pub python_bin: String,
    /// Forwarded to the instrumentation as `--include-children`
    pub include_children: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            python: PythonMode::Auto,
            python_bin: "python3".to_string(),
            include_children: false,
        }
    }
}

/// A live process being profiled.
///
/// Launched processes are owned by the handle and must be reaped with
/// [`ProcessHandle::reap`]; attached processes belong to someone else.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
    command_line: String,
    child: Option<Child>,
}

impl ProcessHandle {
    /// Wrap a process that was started elsewhere
    #[must_use]
    pub fn attached(pid: Pid, command_line: impl Into<String>) -> Self {
        Self { pid, command_line: command_line.into(), child: None }
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Command line recorded in the artifact's `CMDLINE` header
    #[must_use]
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    #[must_use]
    pub fn is_launched(&self) -> bool {
        self.child.is_some()
    }

    /// Kill a launched process that is still running. No-op for attached ones.
    ///
    /// # Errors
    /// Returns an error if the signal cannot be delivered
    pub fn terminate(&mut self) -> std::io::Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        info!("Stopping {}", self.pid);
        child.kill()
    }

    /// Collect the exit status of a launched process.
    ///
    /// Blocks until the process exits. Returns `None` for attached processes.
    ///
    /// # Errors
    /// Returns an error if waiting on the child fails
    pub fn reap(self) -> std::io::Result<Option<ExitStatus>> {
        match self.child {
            Some(mut child) => child.wait().map(Some),
            None => Ok(None),
        }
    }
}

/// Whether `program` should run under the Python instrumentation
#[must_use]
pub fn wants_python(program: &[String], mode: PythonMode) -> bool {
    match mode {
        PythonMode::Force => true,
        PythonMode::Disabled => false,
        PythonMode::Auto => program.first().is_some_and(|p| p.ends_with(".py")),
    }
}

/// Rewrite `program` to run under `python -m memory_profiler`.
///
/// The instrumentation appends its own `FUNC` records to `output`, the same
/// artifact the sampler writes. Both writers open it in append mode, so their
/// lines interleave in an unspecified order.
#[must_use]
pub fn python_command(
    program: &[String],
    output: &Path,
    include_children: bool,
    python_bin: &str,
) -> Vec<String> {
    let mut command = program.to_vec();
    if !command.first().is_some_and(|p| p.starts_with("python")) {
        command.insert(0, python_bin.to_string());
    }

    let mut instrumentation = vec![
        "-m".to_string(),
        "memory_profiler".to_string(),
        "--timestamp".to_string(),
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
    ];
    if include_children {
        instrumentation.push("--include-children".to_string());
    }
    command.splice(1..1, instrumentation);
    command
}

/// Join arguments into one line, quoting those containing whitespace or quotes
#[must_use]
pub fn format_command_line(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"')
            {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Launch `program` and return a handle to it.
///
/// `output` is the artifact path; it is only used when the Python
/// instrumentation is enabled.
///
/// # Errors
/// - [`LaunchError::EmptyCommand`] when `program` is empty
/// - [`LaunchError::Spawn`] when the executable cannot be started
pub fn launch(
    program: &[String],
    output: &Path,
    options: &LaunchOptions,
) -> Result<ProcessHandle, LaunchError> {
    if program.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    let command = if wants_python(program, options.python) {
        info!("Running as a Python program under memory_profiler");
        python_command(program, output, options.include_children, &options.python_bin)
    } else {
        program.to_vec()
    };

    let (executable, args) = command.split_first().ok_or(LaunchError::EmptyCommand)?;
    debug!("Launching {command:?}");

    let child = Command::new(executable)
        .args(args)
        .spawn()
        .map_err(|source| LaunchError::Spawn { program: executable.clone(), source })?;

    let pid = Pid(child.id());
    info!("Launched {executable} as {pid}");

    Ok(ProcessHandle { pid, command_line: format_command_line(&command), child: Some(child) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_wants_python() {
        assert!(wants_python(&args(&["train.py"]), PythonMode::Auto));
        assert!(!wants_python(&args(&["./server"]), PythonMode::Auto));
        assert!(wants_python(&args(&["./server"]), PythonMode::Force));
        assert!(!wants_python(&args(&["train.py"]), PythonMode::Disabled));
        assert!(!wants_python(&[], PythonMode::Auto));
    }

    #[test]
    fn test_python_command_inserts_interpreter() {
        let cmd = python_command(
            &args(&["train.py", "--epochs", "3"]),
            Path::new("mprofile_20240101120000.dat"),
            false,
            "python3",
        );
        assert_eq!(
            cmd,
            args(&[
                "python3",
                "-m",
                "memory_profiler",
                "--timestamp",
                "-o",
                "mprofile_20240101120000.dat",
                "train.py",
                "--epochs",
                "3",
            ])
        );
    }

    #[test]
    fn test_python_command_keeps_explicit_interpreter() {
        let cmd =
            python_command(&args(&["python3.11", "app.py"]), Path::new("out.dat"), true, "python3");
        assert_eq!(cmd[0], "python3.11");
        assert_eq!(
            &cmd[1..6],
            &args(&["-m", "memory_profiler", "--timestamp", "-o", "out.dat"])[..]
        );
        assert_eq!(cmd[6], "--include-children");
        assert_eq!(cmd[7], "app.py");
    }

    #[test]
    fn test_format_command_line_quotes() {
        assert_eq!(format_command_line(&args(&["ls", "-la"])), "ls -la");
        assert_eq!(format_command_line(&args(&["echo", "a b"])), "echo 'a b'");
        assert_eq!(format_command_line(&args(&["echo", ""])), "echo ''");
    }

    #[test]
    fn test_launch_empty_command() {
        let err = launch(&[], Path::new("out.dat"), &LaunchOptions::default()).unwrap_err();
        assert!(matches!(err, LaunchError::EmptyCommand));
    }

    #[test]
    fn test_launch_nonexistent_executable() {
        let err = launch(
            &args(&["/nonexistent/path/to/binary"]),
            Path::new("out.dat"),
            &LaunchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[test]
    fn test_launch_and_reap() {
        let handle =
            launch(&args(&["true"]), Path::new("out.dat"), &LaunchOptions::default()).unwrap();
        assert!(handle.is_launched());
        assert_eq!(handle.command_line(), "true");

        let status = handle.reap().unwrap().unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_terminate_long_running_child() {
        let mut handle =
            launch(&args(&["sleep", "30"]), Path::new("out.dat"), &LaunchOptions::default())
                .unwrap();
        handle.terminate().unwrap();

        let status = handle.reap().unwrap().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_attached_handle_is_not_reaped() {
        let handle = ProcessHandle::attached(Pid(std::process::id()), "self");
        assert!(!handle.is_launched());
        assert!(handle.reap().unwrap().is_none());
    }
}
