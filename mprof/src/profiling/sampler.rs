//! Memory sampling loop
//!
//! Polls a process at a fixed cadence until it terminates, writing one `MEM`
//! record per successful poll (plus `CHLD` records in multiprocess mode).
//!
//! The interval is a minimum sleep between polls, not a schedule: a slow poll
//! pushes every later sample back and no catch-up is attempted. Each record
//! carries the wall-clock time of the actual read.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use mprof_common::{ChildSample, Record, Sample};

use super::memory::MemoryProbe;
use crate::domain::{Bytes, Pid};
use crate::recording::RecordSink;

/// Sampling period used when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Sampling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Minimum pause between two polls
    pub interval: Duration,
    /// Sum the memory of every descendant into each `MEM` sample
    pub include_children: bool,
    /// Additionally write one `CHLD` record per descendant
    pub multiprocess: bool,
    /// Stop after this long even if the process is still running
    pub duration_limit: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            include_children: false,
            multiprocess: false,
            duration_limit: None,
        }
    }
}

/// One poll of the process tree
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Wall-clock read time, POSIX seconds
    pub timestamp: f64,
    /// Root memory, plus descendants when `include_children` is set
    pub total: Bytes,
    /// Per-descendant memory, only collected in multiprocess mode
    pub children: Vec<(Pid, Bytes)>,
}

impl Reading {
    #[must_use]
    pub fn sample(&self) -> Sample {
        Sample::new(self.total.as_megabytes(), self.timestamp)
    }
}

/// Why the sampling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ProcessExited,
    Interrupted,
    DurationLimit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::ProcessExited => "process exited",
            ExitReason::Interrupted => "interrupted",
            ExitReason::DurationLimit => "duration limit reached",
        })
    }
}

/// What a finished sampling run produced
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSummary {
    pub samples: usize,
    /// First sample with the highest memory
    pub peak: Option<Sample>,
    pub elapsed: Duration,
    pub exit_reason: ExitReason,
}

/// Samples one process (tree) through a [`MemoryProbe`]
#[derive(Debug)]
pub struct Sampler<P> {
    probe: P,
    pid: Pid,
    config: SamplerConfig,
}

impl<P: MemoryProbe> Sampler<P> {
    #[must_use]
    pub fn new(probe: P, pid: Pid, config: SamplerConfig) -> Self {
        Self { probe, pid, config }
    }

    #[must_use]
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Read the process tree once.
    ///
    /// Returns `None` once the root process has terminated or can no longer
    /// be read. Descendants that vanish mid-poll count as zero.
    pub fn poll(&self) -> Option<Reading> {
        if !self.probe.is_alive(self.pid) {
            return None;
        }
        let root = match self.probe.resident_bytes(self.pid) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Root process unreadable, stopping: {e}");
                return None;
            }
        };

        let wants_tree = self.config.include_children || self.config.multiprocess;
        let children: Vec<(Pid, Bytes)> = if wants_tree {
            self.probe
                .descendants(self.pid)
                .into_iter()
                .map(|child| {
                    let bytes = self.probe.resident_bytes(child).unwrap_or_else(|e| {
                        debug!("Counting {child} as zero: {e}");
                        Bytes(0)
                    });
                    (child, bytes)
                })
                .collect()
        } else {
            Vec::new()
        };
        let timestamp = wall_clock_seconds();

        let total = if self.config.include_children {
            root + children.iter().map(|&(_, bytes)| bytes).sum::<Bytes>()
        } else {
            root
        };

        Some(Reading {
            timestamp,
            total,
            children: if self.config.multiprocess { children } else { Vec::new() },
        })
    }

    /// Sample until the process exits, `shutdown` resolves, or the duration
    /// limit passes.
    ///
    /// The first poll happens immediately, so a live process always yields at
    /// least one sample. Records already written stay valid when the loop is
    /// interrupted.
    ///
    /// # Errors
    /// Returns an error if `sink` fails to persist a record
    pub async fn run<S, F>(&self, sink: &mut S, shutdown: F) -> io::Result<SamplingSummary>
    where
        S: RecordSink + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let started = Instant::now();
        let mut samples = 0usize;
        let mut peak: Option<Sample> = None;

        info!("Sampling {} every {:?}", self.pid, self.config.interval);

        let exit_reason = loop {
            let Some(reading) = self.poll() else {
                break ExitReason::ProcessExited;
            };

            let sample = reading.sample();
            sink.write_record(&Record::Sample(sample))?;
            for &(child, bytes) in &reading.children {
                sink.write_record(&Record::ChildSample(ChildSample {
                    child: child.0,
                    memory_mb: bytes.as_megabytes(),
                    timestamp: reading.timestamp,
                }))?;
            }
            samples += 1;
            if peak.map_or(true, |p| sample.memory_mb > p.memory_mb) {
                peak = Some(sample);
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                () = &mut shutdown => break ExitReason::Interrupted,
            }

            if self.config.duration_limit.is_some_and(|limit| started.elapsed() >= limit) {
                break ExitReason::DurationLimit;
            }
        };

        let elapsed = started.elapsed();
        info!("Sampling stopped ({exit_reason}) after {samples} samples in {elapsed:.1?}");
        Ok(SamplingSummary { samples, peak, elapsed, exit_reason })
    }
}

/// Current wall-clock time as fractional POSIX seconds
#[must_use]
pub fn wall_clock_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProbeError;
    use std::cell::Cell;
    use std::collections::HashMap;

    const MIB: u64 = 1024 * 1024;

    /// Process tree that stays alive for a fixed number of polls
    struct FakeTree {
        polls_left: Cell<usize>,
        memory: HashMap<Pid, u64>,
        children: Vec<Pid>,
    }

    impl FakeTree {
        fn new(polls: usize) -> Self {
            Self {
                polls_left: Cell::new(polls),
                memory: HashMap::from([(Pid(1), 10 * MIB), (Pid(2), 5 * MIB), (Pid(3), 2 * MIB)]),
                children: vec![Pid(2), Pid(3)],
            }
        }
    }

    impl MemoryProbe for FakeTree {
        fn is_alive(&self, _pid: Pid) -> bool {
            let left = self.polls_left.get();
            self.polls_left.set(left.saturating_sub(1));
            left > 0
        }

        fn resident_bytes(&self, pid: Pid) -> Result<Bytes, ProbeError> {
            self.memory.get(&pid).copied().map(Bytes).ok_or(ProbeError::Vanished(pid))
        }

        fn descendants(&self, _pid: Pid) -> Vec<Pid> {
            self.children.clone()
        }
    }

    fn config(include_children: bool, multiprocess: bool) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(1),
            include_children,
            multiprocess,
            duration_limit: None,
        }
    }

    #[test]
    fn test_include_children_never_lowers_total() {
        let alone = Sampler::new(FakeTree::new(1), Pid(1), config(false, false)).poll().unwrap();
        let tree = Sampler::new(FakeTree::new(1), Pid(1), config(true, false)).poll().unwrap();

        assert_eq!(alone.total, Bytes(10 * MIB));
        assert_eq!(tree.total, Bytes(17 * MIB));
        assert!(tree.total >= alone.total);
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_vanished_child_counts_as_zero() {
        let mut probe = FakeTree::new(1);
        probe.children.push(Pid(99));
        let reading = Sampler::new(probe, Pid(1), config(true, true)).poll().unwrap();

        assert_eq!(reading.total, Bytes(17 * MIB));
        assert_eq!(reading.children.last(), Some(&(Pid(99), Bytes(0))));
    }

    #[test]
    fn test_multiprocess_without_children_in_total() {
        let reading = Sampler::new(FakeTree::new(1), Pid(1), config(false, true)).poll().unwrap();
        assert_eq!(reading.total, Bytes(10 * MIB));
        assert_eq!(reading.children.len(), 2);
    }

    #[test]
    fn test_poll_after_exit_is_none() {
        assert!(Sampler::new(FakeTree::new(0), Pid(1), config(false, false)).poll().is_none());
    }

    #[test]
    fn test_unreadable_root_is_none() {
        let sampler = Sampler::new(FakeTree::new(1), Pid(42), config(false, false));
        assert!(sampler.poll().is_none());
    }

    #[tokio::test]
    async fn test_run_until_process_exits() {
        let sampler = Sampler::new(FakeTree::new(3), Pid(1), config(false, true));
        let mut records: Vec<Record> = Vec::new();

        let summary = sampler.run(&mut records, std::future::pending()).await.unwrap();

        assert_eq!(summary.samples, 3);
        assert_eq!(summary.exit_reason, ExitReason::ProcessExited);
        // One MEM and two CHLD records per tick
        assert_eq!(records.len(), 9);
        assert!(matches!(records[0], Record::Sample(_)));
        assert!(matches!(records[1], Record::ChildSample(ChildSample { child: 2, .. })));
        assert_eq!(summary.peak.unwrap().memory_mb, 10.0);
    }

    #[tokio::test]
    async fn test_run_interrupted_keeps_first_sample() {
        let sampler = Sampler::new(FakeTree::new(100), Pid(1), config(false, false));
        let mut records: Vec<Record> = Vec::new();

        let summary = sampler.run(&mut records, std::future::ready(())).await.unwrap();

        assert_eq!(summary.exit_reason, ExitReason::Interrupted);
        assert_eq!(summary.samples, 1);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_run_duration_limit() {
        let mut cfg = config(false, false);
        cfg.duration_limit = Some(Duration::ZERO);
        let sampler = Sampler::new(FakeTree::new(100), Pid(1), cfg);
        let mut records: Vec<Record> = Vec::new();

        let summary = sampler.run(&mut records, std::future::pending()).await.unwrap();

        assert_eq!(summary.exit_reason, ExitReason::DurationLimit);
        assert_eq!(summary.samples, 1);
    }

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(ExitReason::ProcessExited.to_string(), "process exited");
        assert_eq!(ExitReason::DurationLimit.to_string(), "duration limit reached");
    }

    #[test]
    fn test_wall_clock_is_posix_seconds() {
        // Later than 2020-01-01
        assert!(wall_clock_seconds() > 1_577_836_800.0);
    }
}
