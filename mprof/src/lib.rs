//! # mprof - Process Memory Profiler
//!
//! mprof samples the resident memory of a process (optionally summed over its
//! descendants) at a fixed interval and appends every reading to a
//! timestamped text artifact. Recorded artifacts can be listed, removed,
//! plotted in the terminal, and exported as Chrome traces.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Launcher   │──▶│   Sampler    │──▶│    Writer    │──▶ mprofile_<time>.dat
//! │ (run/attach) │   │ (/proc poll) │   │  (append)    │          │
//! └──────────────┘   └──────────────┘   └──────────────┘          │
//!                                                                  ▼
//!            ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!            │  Plot (TUI)  │◀──│   Analysis   │◀──│    Reader    │
//!            │ Chrome trace │   │    (peak)    │   │   + Index    │
//!            └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profiling`]: acquiring the target process and the sampling loop
//!   - `memory`: the [`profiling::MemoryProbe`] seam and its `/proc` implementation
//!   - `sampler`: polling at a fixed cadence until the process exits
//!   - `session`: one run end to end
//! - [`recording`]: the on-disk artifact (naming, writer, reader, index)
//! - [`analysis`]: peak location and per-function span totals
//! - [`export`]: Chrome Trace Event Format output
//! - [`tui`]: interactive memory-vs-time plot
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: newtypes (`Pid`, `Bytes`) and error types
//!
//! ## Artifact Format
//!
//! One record per line; see [`mprof_common`] for the grammar.
//!
//! ```text
//! CMDLINE ./my-app --flag
//! MEM 12.500000 1700000000.0000
//! FUNC load 12.5000 1700000000.0000 13.0000 1700000000.1000
//! ```
//!
//! ## Typical Usage
//!
//! ```bash
//! mprof run ./my-app        # record until my-app exits
//! mprof attach 1234         # record a running process
//! mprof plot                # plot the newest profile
//! mprof peak 0 -1           # peak memory of the oldest and newest profiles
//! ```

pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod preflight;
pub mod process_lookup;
pub mod profiling;
pub mod recording;
pub mod tui;
