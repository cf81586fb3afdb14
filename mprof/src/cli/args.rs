//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::profiling::{LaunchOptions, PythonMode, SamplerConfig};
use crate::tui::PlotOptions;

#[derive(Parser, Debug)]
#[command(
    name = "mprof",
    version,
    about = "Record a process's memory usage over time and inspect the profiles",
    after_help = "\
EXAMPLES:
    mprof run ./my-app --flag         Record ./my-app into mprofile_<time>.dat
    mprof run -C -T 0.05 make -j8     Include child processes, sample every 50ms
    mprof attach 1234                 Record an already running process
    mprof list                        Show recorded profiles, oldest first
    mprof plot                        Plot the newest profile
    mprof rm 0 -1 --dry-run           Show what removing the oldest and newest would delete"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a program and record its memory usage
    Run(RunArgs),
    /// Record the memory usage of a running process
    Attach(AttachArgs),
    /// List recorded profiles in the current directory
    List,
    /// Remove profiles by index or file name
    Rm(RmArgs),
    /// Remove every profile in the current directory
    Clean(CleanArgs),
    /// Plot one or more profiles (default: the newest)
    Plot(PlotArgs),
    /// Print the peak memory of one or more profiles (default: the newest)
    Peak(PeakArgs),
}

/// Options shared by `run` and `attach`
#[derive(clap::Args, Debug, Clone)]
pub struct SamplingArgs {
    /// Sampling period in seconds
    #[arg(
        short = 'T',
        long,
        value_name = "SECONDS",
        default_value = "0.1",
        value_parser = parse_interval
    )]
    pub interval: Duration,

    /// Sum the memory of all child processes into each sample
    #[arg(short = 'C', long)]
    pub include_children: bool,

    /// Also record each child process separately
    #[arg(short = 'M', long)]
    pub multiprocess: bool,

    /// Write the profile to FILE instead of mprofile_<time>.dat
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl SamplingArgs {
    #[must_use]
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: self.interval,
            include_children: self.include_children,
            multiprocess: self.multiprocess,
            duration_limit: (self.duration > 0).then(|| Duration::from_secs(self.duration)),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Run the program under Python's memory_profiler to record function spans
    #[arg(long, conflicts_with = "nopython")]
    pub python: bool,

    /// Never add the Python instrumentation, even for .py scripts
    #[arg(long)]
    pub nopython: bool,

    /// Interpreter used for scripts that do not name one
    #[arg(long, value_name = "PATH", default_value = "python3")]
    pub python_bin: String,

    /// Exit with the profiled program's exit code
    #[arg(short = 'E', long)]
    pub exit_code: bool,

    /// Program to run, followed by its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    pub program: Vec<String>,
}

impl RunArgs {
    #[must_use]
    pub fn launch_options(&self) -> LaunchOptions {
        let python = if self.python {
            PythonMode::Force
        } else if self.nopython {
            PythonMode::Disabled
        } else {
            PythonMode::Auto
        };
        LaunchOptions {
            python,
            python_bin: self.python_bin.clone(),
            include_children: self.sampling.include_children,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct AttachArgs {
    #[command(flatten)]
    pub sampling: SamplingArgs,

    /// Process ID or process name
    #[arg(value_name = "PID|NAME")]
    pub target: String,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    /// Only show which files would be removed
    #[arg(long)]
    pub dry_run: bool,

    /// Profile indices (negative counts from the newest) or file names
    #[arg(required = true, allow_negative_numbers = true, value_name = "PROFILE")]
    pub profiles: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct CleanArgs {
    /// Only show which files would be removed
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct PlotArgs {
    /// Profile indices or file names (default: the newest)
    #[arg(allow_negative_numbers = true, value_name = "PROFILE")]
    pub profiles: Vec<String>,

    /// Plot title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Do not draw function span brackets
    #[arg(short = 'n', long)]
    pub no_function_ts: bool,

    /// Initial time window in seconds, e.g. 2.5,10
    #[arg(short, long, value_name = "START,END", value_parser = parse_window)]
    pub window: Option<(f64, f64)>,

    /// Write a Chrome trace (Perfetto, chrome://tracing) instead of opening the plot
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

impl PlotArgs {
    #[must_use]
    pub fn plot_options(&self) -> PlotOptions {
        PlotOptions {
            title: self.title.clone(),
            show_spans: !self.no_function_ts,
            window: self.window,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct PeakArgs {
    /// Profile indices or file names (default: the newest)
    #[arg(allow_negative_numbers = true, value_name = "PROFILE")]
    pub profiles: Vec<String>,
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    match Duration::try_from_secs_f64(secs) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(format!("interval must be a positive number of seconds, got {s}")),
    }
}

fn parse_window(s: &str) -> Result<(f64, f64), String> {
    let (start, end) = s.split_once(',').ok_or_else(|| format!("expected START,END, got '{s}'"))?;
    let start: f64 = start.trim().parse().map_err(|_| format!("'{start}' is not a number"))?;
    let end: f64 = end.trim().parse().map_err(|_| format!("'{end}' is not a number"))?;
    if end <= start {
        return Err(format!("window end ({end}) must be after its start ({start})"));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("mprof").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_run_defaults() {
        let Command::Run(run) = parse(&["run", "./app"]).command else {
            panic!("expected run");
        };
        let config = run.sampling.sampler_config();
        assert_eq!(config.interval, Duration::from_millis(100));
        assert!(!config.include_children);
        assert_eq!(config.duration_limit, None);
        assert_eq!(run.launch_options().python, PythonMode::Auto);
    }

    #[test]
    fn test_run_program_keeps_its_own_flags() {
        let Command::Run(run) = parse(&["run", "-C", "-T", "0.5", "ls", "-la", "--color"]).command
        else {
            panic!("expected run");
        };
        assert_eq!(run.program, vec!["ls", "-la", "--color"]);
        assert!(run.sampling.include_children);
        assert_eq!(run.sampling.interval, Duration::from_millis(500));
    }

    #[test]
    fn test_run_python_flags_conflict() {
        let err = Args::try_parse_from(["mprof", "run", "--python", "--nopython", "a.py"]);
        assert!(err.is_err());

        let Command::Run(run) = parse(&["run", "--nopython", "a.py"]).command else {
            panic!("expected run");
        };
        assert_eq!(run.launch_options().python, PythonMode::Disabled);
    }

    #[test]
    fn test_rm_accepts_negative_indices() {
        let Command::Rm(rm) = parse(&["rm", "--dry-run", "0", "-1"]).command else {
            panic!("expected rm");
        };
        assert!(rm.dry_run);
        assert_eq!(rm.profiles, vec!["0", "-1"]);
    }

    #[test]
    fn test_plot_options() {
        let Command::Plot(plot) = parse(&["plot", "-n", "--window", "1,5", "-1"]).command else {
            panic!("expected plot");
        };
        let options = plot.plot_options();
        assert!(!options.show_spans);
        assert_eq!(options.window, Some((1.0, 5.0)));
        assert_eq!(plot.profiles, vec!["-1"]);
    }

    #[test]
    fn test_parse_interval_rejects_non_positive() {
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("abc").is_err());
        assert!(parse_interval("inf").is_err());
        assert!(parse_interval("1e30").is_err());
        // Rounds to zero nanoseconds
        assert!(parse_interval("1e-12").is_err());
        assert_eq!(parse_interval("0.25").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_huge_interval_is_a_usage_error() {
        let err = Args::try_parse_from(["mprof", "run", "-T", "1e30", "true"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("2.5, 10").unwrap(), (2.5, 10.0));
        assert!(parse_window("10,2").is_err());
        assert!(parse_window("10").is_err());
    }
}
