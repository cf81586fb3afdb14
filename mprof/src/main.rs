//! # mprof - Main Entry Point
//!
//! Subcommands:
//! - **Recording** (`run`, `attach`): sample a process into `mprofile_<time>.dat`
//! - **Bookkeeping** (`list`, `rm`, `clean`): manage artifacts in the working directory
//! - **Inspection** (`plot`, `peak`): read artifacts back

// Summary lines convert counts for display
#![allow(clippy::cast_precision_loss)]

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use mprof::analysis::peak;
use mprof::cli::args::{AttachArgs, PeakArgs, PlotArgs, RmArgs, RunArgs, SamplingArgs};
use mprof::cli::{Args, Command};
use mprof::export::ChromeTraceExporter;
use mprof::preflight::is_permission_denied;
use mprof::process_lookup::resolve_attach_target;
use mprof::profiling::{record, RunOptions, RunOutcome, Target};
use mprof::recording::{read_profile, remove_profiles, ProfileData, ProfileIndex};
use mprof::tui::App;

// Exit codes (usage errors exit with 2 from clap)
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if is_permission_denied(err) {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<i32> {
    let args = Args::parse();

    match args.command {
        Command::Run(run) => run_program(run).await,
        Command::Attach(attach) => attach_process(attach).await,
        Command::List => list_profiles().map(|()| EXIT_SUCCESS),
        Command::Rm(rm) => remove(&rm).map(|()| EXIT_SUCCESS),
        Command::Clean(clean) => clean_profiles(clean.dry_run).map(|()| EXIT_SUCCESS),
        Command::Plot(plot) => plot_profiles(&plot).map(|()| EXIT_SUCCESS),
        Command::Peak(peak) => print_peaks(&peak).map(|()| EXIT_SUCCESS),
    }
}

/// Resolves once Ctrl+C is received; never, if the handler cannot be installed
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn run_options(sampling: &SamplingArgs, launch: mprof::profiling::LaunchOptions) -> RunOptions {
    RunOptions { sampler: sampling.sampler_config(), launch, output: sampling.output.clone() }
}

async fn run_program(args: RunArgs) -> Result<i32> {
    let options = run_options(&args.sampling, args.launch_options());
    if !args.sampling.quiet {
        println!("mprof: sampling memory every {:?}", options.sampler.interval);
    }

    let outcome = record(Target::Launch(args.program), &options, ctrl_c()).await?;
    report(&outcome, args.sampling.quiet);

    Ok(if args.exit_code {
        outcome.child_exit_code().unwrap_or(EXIT_SUCCESS)
    } else {
        EXIT_SUCCESS
    })
}

async fn attach_process(args: AttachArgs) -> Result<i32> {
    let process = resolve_attach_target(&args.target)?;
    let options = run_options(&args.sampling, mprof::profiling::LaunchOptions::default());
    if !args.sampling.quiet {
        let exe = process
            .exe_path
            .as_deref()
            .map_or_else(String::new, |p| format!(", {}", p.display()));
        println!("mprof: attaching to {} ({}{exe})", process.pid.0, process.command);
        println!("mprof: sampling memory every {:?}", options.sampler.interval);
    }

    let outcome = record(Target::Attach(process.pid), &options, ctrl_c()).await?;
    report(&outcome, args.sampling.quiet);
    Ok(EXIT_SUCCESS)
}

fn report(outcome: &RunOutcome, quiet: bool) {
    let summary = &outcome.summary;
    info!("Run finished: {summary:?}");
    if quiet {
        return;
    }
    let peak =
        summary.peak.map_or_else(|| "n/a".to_string(), |p| format!("{:.1} MiB", p.memory_mb));
    eprintln!(
        "\n{}: {:.1}s, {} samples, peak {peak}",
        summary.exit_reason,
        summary.elapsed.as_secs_f64(),
        summary.samples,
    );
    println!("saved: {}", outcome.artifact.display());
}

fn list_profiles() -> Result<()> {
    let index = ProfileIndex::scan(".")?;
    for entry in index.entries() {
        let started = entry
            .start_time
            .map_or_else(|| "?".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        println!(
            "{} {} {} {}",
            entry.index,
            entry.file_name(),
            started,
            entry.command_line.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn print_removal(paths: &[PathBuf], dry_run: bool) {
    let verb = if dry_run { "would remove" } else { "removed" };
    for path in paths {
        println!("{verb}: {}", path.display());
    }
}

fn remove(args: &RmArgs) -> Result<()> {
    let index = ProfileIndex::scan(".")?;
    // Every reference resolves before anything is deleted
    let paths = index.resolve(&args.profiles)?;
    let removed = remove_profiles(&paths, args.dry_run).context("Failed to remove profile")?;
    print_removal(&removed, args.dry_run);
    Ok(())
}

fn clean_profiles(dry_run: bool) -> Result<()> {
    let index = ProfileIndex::scan(".")?;
    let paths = index.resolve_all()?;
    let removed = remove_profiles(&paths, dry_run).context("Failed to remove profile")?;
    print_removal(&removed, dry_run);
    Ok(())
}

/// Load the referenced profiles, or the newest one when none are given
fn load_profiles(refs: &[String]) -> Result<Vec<ProfileData>> {
    let index = ProfileIndex::scan(".")?;
    let paths: Vec<PathBuf> = if refs.is_empty() {
        let latest = index.latest().context(
            "No profiles found in the current directory.\n\
             Record one with: mprof run <PROGRAM>",
        )?;
        vec![latest.to_path_buf()]
    } else {
        index.resolve(refs)?.into_iter().filter(|p| !is_timestamp_sibling(p)).collect()
    };

    paths.iter().map(|p| read_profile(p).map_err(anyhow::Error::from)).collect()
}

fn is_timestamp_sibling(path: &Path) -> bool {
    path.file_stem().is_some_and(|s| s.to_string_lossy().ends_with("_ts"))
}

fn plot_profiles(args: &PlotArgs) -> Result<()> {
    let profiles = load_profiles(&args.profiles)?;

    if let Some(export_path) = &args.export {
        let mut exporter = ChromeTraceExporter::new();
        for profile in &profiles {
            exporter.add_profile(profile);
        }
        exporter.export_to_file(export_path).context("Failed to export trace")?;
        println!("saved: {}", export_path.display());
        return Ok(());
    }

    if !std::io::stdout().is_terminal() {
        bail!(
            "plot needs an interactive terminal.\n\n\
             Export a Chrome trace instead: mprof plot --export trace.json"
        );
    }
    App::new(&profiles, &args.plot_options()).run()
}

fn print_peaks(args: &PeakArgs) -> Result<()> {
    for profile in load_profiles(&args.profiles)? {
        let name = profile.path.display();
        match peak(&profile) {
            Some(p) => println!("{name}\t{:.3} MiB at {:.4}", p.memory_mb, p.timestamp),
            None => println!("{name}\tno samples"),
        }
    }
    Ok(())
}
