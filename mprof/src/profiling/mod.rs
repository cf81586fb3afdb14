//! Profiling core
//!
//! - `process_tree`: parent/child snapshot of `/proc`
//! - `memory`: the [`MemoryProbe`] seam and its `/proc` implementation
//! - `launcher`: turn a [`Target`] into a live [`ProcessHandle`]
//! - `sampler`: the polling loop
//! - `session`: one run end to end (acquire, sample, reap)

pub mod launcher;
pub mod memory;
pub mod process_tree;
pub mod sampler;
pub mod session;

pub use launcher::{launch, LaunchOptions, ProcessHandle, PythonMode, Target};
pub use memory::{MemoryProbe, ProcFs};
pub use sampler::{ExitReason, Reading, Sampler, SamplerConfig, SamplingSummary};
pub use session::{record, RunOptions, RunOutcome};
