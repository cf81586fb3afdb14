use std::path::Path;
use std::time::Duration;

use mprof::domain::Pid;
use mprof::profiling::{
    launch, ExitReason, LaunchOptions, MemoryProbe, ProcFs, PythonMode, Sampler, SamplerConfig,
};
use mprof_common::Record;

fn no_python() -> LaunchOptions {
    LaunchOptions { python: PythonMode::Disabled, ..LaunchOptions::default() }
}

fn command(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_sample_count_tracks_process_lifetime() {
    let handle =
        launch(&command(&["sleep", "0.5"]), Path::new("unused.dat"), &no_python()).unwrap();
    let config = SamplerConfig { interval: Duration::from_millis(50), ..SamplerConfig::default() };
    let sampler = Sampler::new(ProcFs::new(), handle.pid(), config);

    let mut records: Vec<Record> = Vec::new();
    let summary = sampler.run(&mut records, std::future::pending()).await.unwrap();

    assert_eq!(summary.exit_reason, ExitReason::ProcessExited);
    // About 10 ticks; load can only lower the count
    assert!(summary.samples >= 1, "no samples recorded");
    assert!(summary.samples <= 15, "too many samples: {}", summary.samples);
    assert_eq!(records.len(), summary.samples);

    // The sampler never reaps; the launcher still owns the exit status
    let status = handle.reap().unwrap().unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_timestamps_follow_collection_order() {
    let handle =
        launch(&command(&["sleep", "0.3"]), Path::new("unused.dat"), &no_python()).unwrap();
    let config = SamplerConfig { interval: Duration::from_millis(20), ..SamplerConfig::default() };
    let sampler = Sampler::new(ProcFs::new(), handle.pid(), config);

    let mut records: Vec<Record> = Vec::new();
    sampler.run(&mut records, std::future::pending()).await.unwrap();
    handle.reap().unwrap();

    let times: Vec<f64> = records
        .iter()
        .filter_map(|r| match r {
            Record::Sample(s) => Some(s.timestamp),
            _ => None,
        })
        .collect();
    assert!(times.windows(2).all(|w| w[1] - w[0] >= 0.015), "samples closer than the interval");
}

#[test]
fn test_children_included_in_total() {
    // A shell with two sleeping children
    let handle = launch(
        &command(&["sh", "-c", "sleep 2 & sleep 2 & wait"]),
        Path::new("unused.dat"),
        &no_python(),
    )
    .unwrap();
    let pid = handle.pid();
    let probe = ProcFs::new();

    // Wait for the children to appear
    let mut children = Vec::new();
    for _ in 0..50 {
        children = probe.descendants(pid);
        if children.len() >= 2 {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(children.len() >= 2, "children never appeared: {children:?}");

    let alone = Sampler::new(ProcFs::new(), pid, SamplerConfig::default()).poll().unwrap();
    let tree = Sampler::new(
        ProcFs::new(),
        pid,
        SamplerConfig { include_children: true, multiprocess: true, ..SamplerConfig::default() },
    )
    .poll()
    .unwrap();

    assert!(tree.total > alone.total);
    assert!(tree.children.len() >= 2);

    let mut handle = handle;
    handle.terminate().unwrap();
    handle.reap().unwrap();
    for child in children {
        // Orphaned sleeps are reparented; make sure they go away
        kill_process(child);
    }
}

fn kill_process(pid: Pid) {
    let _ = std::process::Command::new("kill").arg(pid.0.to_string()).status();
}

#[test]
fn test_poll_of_missing_process_is_none() {
    let sampler = Sampler::new(ProcFs::new(), Pid(999_999_999), SamplerConfig::default());
    assert!(sampler.poll().is_none());
}
