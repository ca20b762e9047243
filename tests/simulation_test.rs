//! End-to-end simulation runs against a fake encoder on virtual time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use camsim::clock::SimulatedClock;
use camsim::config::{DurationRange, PatternConfig};
use camsim::orchestrator;
use camsim::worker::WorkerState;
use camsim_core::{Error, FailureKind, SourceRange};
use common::{simulator, t0, FakeProbe, TestHarness};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[tokio::test]
async fn continuous_camera_writes_contiguous_segments() {
    let h = TestHarness::new();
    let source = h.source("lobby.mp4", 1024);
    let camera = h.camera("lobby", &source, 10.0);
    let probe = FakeProbe::default().with(&source, secs(25));

    let handle = orchestrator::start(&[camera], h.context(simulator(25.0), probe))
        .await
        .unwrap();
    let summary = handle.wait().await;

    let lobby = summary.camera("lobby").unwrap();
    assert_eq!(lobby.state, WorkerState::Stopped);
    assert_eq!(lobby.stats.segments_written, 3);

    let requests = h.encoder.requests();
    assert_eq!(requests.len(), 3);
    let ranges: Vec<Vec<SourceRange>> = requests.iter().map(|r| r.ranges.clone()).collect();
    assert_eq!(
        ranges,
        vec![
            vec![SourceRange::new(secs(0), secs(10))],
            vec![SourceRange::new(secs(10), secs(10))],
            vec![
                SourceRange::new(secs(20), secs(5)),
                SourceRange::new(secs(0), secs(5))
            ],
        ]
    );

    assert_eq!(
        h.files(&h.output_folder("lobby")),
        vec![
            "lobby_20240310_140000.mp4",
            "lobby_20240310_140010.mp4",
            "lobby_20240310_140020.mp4",
        ]
    );
}

#[tokio::test]
async fn unusable_source_fails_only_its_camera() {
    let h = TestHarness::new();
    let good = h.source("good.mp4", 2048);
    let empty = h.source("empty.mp4", 0);
    let cameras = vec![
        h.camera("good", &good, 10.0),
        h.camera("broken", &empty, 10.0),
    ];

    let handle = orchestrator::start(&cameras, h.context(simulator(30.0), FakeProbe::default()))
        .await
        .unwrap();

    assert_eq!(handle.running(), vec!["good"]);
    assert_eq!(handle.failed().len(), 1);
    assert_eq!(handle.failed()[0].camera, "broken");
    assert_matches!(handle.failed()[0].error, Error::UnusableSource { .. });

    let summary = handle.wait().await;
    assert_eq!(summary.camera("good").unwrap().stats.segments_written, 3);
    assert!(summary.camera("broken").is_none());
    assert!(!h.output_folder("broken").exists());
}

#[tokio::test]
async fn zero_duration_source_is_unusable() {
    let h = TestHarness::new();
    let source = h.source("still.mp4", 10);
    let probe = FakeProbe::default().with(&source, Duration::ZERO);

    let handle = orchestrator::start(
        &[h.camera("still", &source, 10.0)],
        h.context(simulator(30.0), probe),
    )
    .await
    .unwrap();

    assert!(handle.running().is_empty());
    assert_matches!(handle.failed()[0].error, Error::UnusableSource { .. });
    handle.wait().await;
}

#[tokio::test]
async fn duplicate_names_start_nothing() {
    let h = TestHarness::new();
    let source = h.source("a.mp4", 100);
    let cameras = vec![h.camera("dup", &source, 10.0), h.camera("dup", &source, 5.0)];

    let result = orchestrator::start(&cameras, h.context(simulator(30.0), FakeProbe::default())).await;

    assert_matches!(result, Err(Error::Config(_)));
    assert!(h.encoder.requests().is_empty());
    assert!(!h.output_folder("dup").exists());
}

#[tokio::test]
async fn invalid_pattern_starts_nothing() {
    let h = TestHarness::new();
    let source = h.source("a.mp4", 100);
    let good = h.camera("good", &source, 10.0);
    let mut bad = h.camera("bad", &source, 10.0);
    bad.pattern = PatternConfig::MotionTriggered {
        on_secs: DurationRange::new(30.0, 10.0),
        off_secs: DurationRange::new(5.0, 10.0),
    };

    let result = orchestrator::start(&[good, bad], h.context(simulator(30.0), FakeProbe::default())).await;
    assert_matches!(result, Err(Error::Config(_)));
    assert!(h.encoder.requests().is_empty());
}

#[tokio::test]
async fn skipped_segment_does_not_stop_the_camera() {
    let h = TestHarness::new();
    let source = h.source("yard.mp4", 100);
    // Call 2 fails permanently: segment 2 is skipped without retry.
    h.encoder.fail_call(2, FailureKind::Permanent);
    // Calls 4 and 5 fail transiently: segment 4 succeeds on its third attempt.
    h.encoder.fail_call(4, FailureKind::Transient);
    h.encoder.fail_call(5, FailureKind::Transient);

    let handle = orchestrator::start(
        &[h.camera("yard", &source, 10.0)],
        h.context(simulator(40.0), FakeProbe::default()),
    )
    .await
    .unwrap();
    let summary = handle.wait().await;

    let yard = summary.camera("yard").unwrap();
    assert_eq!(yard.stats.segments_failed, 1);
    assert_eq!(yard.stats.segments_written, 3);
    assert!(yard.error.is_none());
    assert_eq!(h.encoder.requests().len(), 6);
    assert_eq!(
        h.files(&h.output_folder("yard")),
        vec![
            "yard_20240310_140000.mp4",
            "yard_20240310_140020.mp4",
            "yard_20240310_140030.mp4",
        ]
    );
}

#[tokio::test]
async fn cameras_sharing_a_source_keep_independent_cursors() {
    let h = TestHarness::new();
    let source = h.source("shared.mp4", 100);
    let cameras = vec![h.camera("a", &source, 10.0), h.camera("b", &source, 4.0)];

    let handle = orchestrator::start(&cameras, h.context(simulator(20.0), FakeProbe::default()))
        .await
        .unwrap();
    handle.wait().await;

    let offsets = |name: &str| -> Vec<u64> {
        h.encoder
            .requests_in(&h.output_folder(name))
            .iter()
            .map(|r| r.ranges[0].offset.as_secs())
            .collect()
    };
    assert_eq!(offsets("a"), vec![0, 10]);
    assert_eq!(offsets("b"), vec![0, 4, 8, 12, 16]);
}

#[tokio::test]
async fn stop_waits_for_every_worker() {
    let h = TestHarness::new();
    let source = h.source("gate.mp4", 100);
    let cameras = vec![h.camera("gate", &source, 10.0), h.camera("dock", &source, 10.0)];

    // Unbounded run; both cameras push one shared virtual clock forward.
    let clock = Arc::new(SimulatedClock::new(t0()));
    let handle = orchestrator::start(
        &cameras,
        h.shared_clock_context(simulator(0.0), FakeProbe::default(), clock),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let summary = handle.stop().await;

    assert_eq!(summary.cameras.len(), 2);
    for camera in &summary.cameras {
        assert_eq!(camera.state, WorkerState::Stopped);
        assert!(camera.error.is_none());
        assert!(camera.stats.segments_written >= 1);
    }
}

#[tokio::test]
async fn realtime_stop_interrupts_pacing_sleep() {
    let h = TestHarness::new();
    let source = h.source("hall.mp4", 100);
    let handle = orchestrator::start(
        &[h.camera("hall", &source, 3600.0)],
        h.realtime_context(simulator(0.0), FakeProbe::default()),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let statuses = handle.statuses();
    assert_eq!(statuses[0].stats.segments_written, 1);

    let started = std::time::Instant::now();
    let summary = handle.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.camera("hall").unwrap().state, WorkerState::Stopped);
    assert_eq!(h.encoder.requests().len(), 1);
}
