//! Integration tests for the subprocess loudness meter
//!
//! A shell script stands in for ffmpeg and prints ebur128-style lines to
//! stderr, so deadline handling and sample collection run against a real
//! child process.

#![cfg(unix)]

use loudmon_analyzer::models::{Profile, StreamDescriptor};
use loudmon_analyzer::services::{LoudnessMeter, MeterSettings};
use loudmon_analyzer::types::LoudnessProbe;
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const URL: &str = "udp://239.1.0.1:5000";

/// Write an executable stand-in for ffmpeg
fn fake_ffmpeg(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn meter(program: PathBuf) -> LoudnessMeter {
    LoudnessMeter::new(MeterSettings {
        program,
        ..MeterSettings::default()
    })
}

fn ebur128_line(t: f64, momentary: f64) -> String {
    format!(
        "[Parsed_ebur128_0 @ 0x55d0c4] t: {:.1}       TARGET:-23 LUFS    M: {:.1} S: -25.0     I: -24.8 LUFS       LRA:   0.0 LU",
        t, momentary
    )
}

#[tokio::test]
#[serial]
async fn test_natural_exit_summarized() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = [-22.0, -20.0, -24.0]
        .iter()
        .enumerate()
        .map(|(i, m)| format!("echo '{}' >&2", ebur128_line(i as f64 * 0.1, *m)))
        .collect();
    let program = fake_ffmpeg(&dir, &format!("echo 'Input #0, mpegts' >&2\n{}\nexit 0", lines.join("\n")));

    let run = meter(program).run(URL, Duration::from_secs(10)).await.unwrap();

    assert!(!run.timed_out);
    assert!(run.exit_status.map_or(false, |s| s.success()));
    assert_eq!(run.sample_count, 3);
    let summary = run.summary.unwrap();
    assert_eq!(summary.min_db, -24.0);
    assert_eq!(summary.max_db, -20.0);
    assert!((summary.avg_db - -22.0).abs() < 1e-9);
}

#[tokio::test]
#[serial]
async fn test_continuous_stream_killed_keeps_samples() {
    let dir = TempDir::new().unwrap();
    let program = fake_ffmpeg(
        &dir,
        &format!(
            "while true; do echo '{}' >&2; sleep 0.05; done",
            ebur128_line(0.0, -19.0)
        ),
    );
    let limit = Duration::from_millis(800);

    let run = meter(program).run(URL, limit).await.unwrap();

    assert!(run.timed_out);
    assert!(run.exit_status.is_none());
    assert!(run.sample_count > 0);
    assert_eq!(run.summary.unwrap().avg_db, -19.0);
    assert!(run.elapsed >= limit);
    assert!(run.elapsed < limit + Duration::from_secs(3), "took {:?}", run.elapsed);
}

#[tokio::test]
#[serial]
async fn test_silent_stream_yields_nothing_at_deadline() {
    let dir = TempDir::new().unwrap();
    let program = fake_ffmpeg(&dir, "exec sleep 30");
    let limit = Duration::from_millis(500);

    let run = meter(program).run(URL, limit).await.unwrap();

    assert!(run.timed_out);
    assert!(run.summary.is_none());
    assert_eq!(run.sample_count, 0);
    assert!(run.elapsed < Duration::from_secs(5), "took {:?}", run.elapsed);
}

#[tokio::test]
#[serial]
async fn test_crash_without_output() {
    let dir = TempDir::new().unwrap();
    let program = fake_ffmpeg(&dir, "echo 'udp://239.1.0.1:5000: Connection refused' >&2\nexit 1");

    let run = meter(program).run(URL, Duration::from_secs(10)).await.unwrap();

    assert!(!run.timed_out);
    assert!(run.exit_status.map_or(false, |s| !s.success()));
    assert!(run.summary.is_none());
}

#[tokio::test]
#[serial]
async fn test_trailing_line_without_newline_counted() {
    let dir = TempDir::new().unwrap();
    let program = fake_ffmpeg(&dir, "printf 'M: -21.0\\nM: -23.0' >&2");

    let run = meter(program).run(URL, Duration::from_secs(10)).await.unwrap();

    assert_eq!(run.sample_count, 2);
    assert_eq!(run.summary.unwrap().avg_db, -22.0);
}

#[tokio::test]
#[serial]
async fn test_probe_maps_missing_tool_to_none() {
    let probe = meter(PathBuf::from("/nonexistent/loudmon-ffmpeg"));
    let descriptor = StreamDescriptor::new("News", "N1", Profile::Low, URL);

    let result = probe.measure(&descriptor, Duration::from_secs(1)).await;
    assert!(result.is_none());
}

#[tokio::test]
#[serial]
async fn test_check_available_uses_version_flag() {
    let dir = TempDir::new().unwrap();
    let program = fake_ffmpeg(&dir, "[ \"$1\" = \"-version\" ] && exit 0\nexit 3");
    assert!(meter(program).check_available().await.is_ok());

    let dir = TempDir::new().unwrap();
    let broken = fake_ffmpeg(&dir, "exit 3");
    assert!(meter(broken).check_available().await.is_err());
}

#[tokio::test]
#[serial]
async fn test_url_passed_to_tool() {
    let dir = TempDir::new().unwrap();
    let program = fake_ffmpeg(
        &dir,
        "for a in \"$@\"; do [ \"$a\" = \"udp://239.1.0.1:5000\" ] && echo 'M: -20.0' >&2; done\nexit 0",
    );

    let run = meter(program).run(URL, Duration::from_secs(10)).await.unwrap();
    assert_eq!(run.sample_count, 1);
}
