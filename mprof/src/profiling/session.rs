//! One profiling run, end to end
//!
//! Acquire the target, open the artifact, sample until the process exits or
//! the run is stopped, then reap whatever was launched.

use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::launcher::{launch, LaunchOptions, ProcessHandle, Target};
use super::memory::ProcFs;
use super::sampler::{ExitReason, Sampler, SamplerConfig, SamplingSummary};
use crate::preflight::{check_proc_access, check_process_exists, run_preflight_checks};
use crate::process_lookup::read_command_line;
use crate::recording::naming::artifact_name_now;
use crate::recording::ProfileWriter;

/// Everything a run needs besides the target
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub sampler: SamplerConfig,
    pub launch: LaunchOptions,
    /// Artifact path; a timestamped name in the working directory when unset
    pub output: Option<PathBuf>,
}

/// Result of a finished run
#[derive(Debug)]
pub struct RunOutcome {
    pub artifact: PathBuf,
    pub summary: SamplingSummary,
    /// Exit status of a launched process; `None` when attached
    pub exit_status: Option<ExitStatus>,
}

impl RunOutcome {
    /// Shell-style exit code of the launched process (128 + signal when killed)
    #[must_use]
    pub fn child_exit_code(&self) -> Option<i32> {
        self.exit_status.map(|status| {
            status.code().or_else(|| status.signal().map(|sig| 128 + sig)).unwrap_or(1)
        })
    }
}

/// Artifact path for a run: the explicit `output`, or `mprofile_<now>.dat`
#[must_use]
pub fn artifact_path(output: Option<&Path>) -> PathBuf {
    output.map_or_else(|| PathBuf::from(artifact_name_now()), Path::to_path_buf)
}

/// Profile `target` until it exits or `shutdown` resolves.
///
/// A launch failure aborts before the artifact is created. A launched process
/// is always reaped before this returns: if the artifact cannot be written, or
/// sampling stops early (shutdown, duration limit), it is killed first.
/// Attached processes are left running.
///
/// # Errors
/// Returns an error if the target cannot be acquired, the artifact cannot be
/// written, or a launched process cannot be reaped
pub async fn record<F>(target: Target, options: &RunOptions, shutdown: F) -> Result<RunOutcome>
where
    F: Future<Output = ()>,
{
    run_preflight_checks()?;

    let artifact = artifact_path(options.output.as_deref());
    if options.output.is_none() && artifact.exists() {
        // Same-second runs share a name; both writers append to one file
        warn!("{} already exists, appending to it", artifact.display());
    }

    let mut handle = acquire(target, &artifact, &options.launch)?;

    let mut writer = match open_artifact(&artifact, handle.command_line()) {
        Ok(writer) => writer,
        Err(err) => {
            stop(&mut handle);
            reap(handle).await?;
            return Err(err);
        }
    };
    info!("Recording {} into {}", handle.pid(), writer.path().display());

    let sampler = Sampler::new(ProcFs::new(), handle.pid(), options.sampler);
    debug!("Sampler settings: {:?}", sampler.config());
    let summary = sampler.run(&mut writer, shutdown).await;
    let closed = writer.close();

    let finished = closed.is_ok()
        && matches!(&summary, Ok(s) if s.exit_reason == ExitReason::ProcessExited);
    if !finished {
        stop(&mut handle);
    }
    let exit_status = reap(handle).await;

    closed.with_context(|| format!("Failed to sync {}", artifact.display()))?;
    let summary = summary.with_context(|| format!("Failed to write {}", artifact.display()))?;
    Ok(RunOutcome { artifact, summary, exit_status: exit_status? })
}

fn acquire(target: Target, artifact: &Path, options: &LaunchOptions) -> Result<ProcessHandle> {
    match target {
        Target::Launch(program) => Ok(launch(&program, artifact, options)?),
        Target::Attach(pid) => {
            check_process_exists(pid)?;
            check_proc_access(pid)?;
            let command_line = read_command_line(pid, &pid.0.to_string());
            Ok(ProcessHandle::attached(pid, command_line))
        }
    }
}

fn open_artifact(artifact: &Path, command_line: &str) -> Result<ProfileWriter> {
    let mut writer = ProfileWriter::open(artifact)
        .with_context(|| format!("Failed to open {}", artifact.display()))?;
    writer
        .write_command_line(command_line)
        .with_context(|| format!("Failed to write {}", artifact.display()))?;
    Ok(writer)
}

/// Kill a launched process that must not outlive the run
fn stop(handle: &mut ProcessHandle) {
    if let Err(e) = handle.terminate() {
        warn!("Failed to stop {}: {e}", handle.pid());
    }
}

async fn reap(handle: ProcessHandle) -> Result<Option<ExitStatus>> {
    tokio::task::spawn_blocking(move || handle.reap())
        .await
        .context("Reaper task failed")?
        .context("Failed to collect exit status")
}
