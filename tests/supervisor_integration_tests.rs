//! Integration tests for WorkerSupervisor against scripted fake workers.
//!
//! These tests verify that the supervisor correctly:
//! - Spawns the worker lazily on the first command
//! - Decodes the worker's line-delimited event stream (dropping garbage)
//! - Surfaces stderr output as diagnostic error events
//! - Synthesizes exactly one process-exit event per worker
//! - Shuts down gracefully, force-killing after the grace deadline
//! - Respawns after an unexpected worker death
//!
//! The fake workers are tiny shell scripts, so everything here is
//! unix-only.
#![cfg(unix)]

use camino::Utf8PathBuf;
use photodup::protocol::{Command, Event, KILLED_EXIT_CODE};
use photodup::{WorkerConfig, WorkerSupervisor};
use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Write an executable fake-worker script and point a config at it.
fn fake_worker(dir: &TempDir, script: &str) -> WorkerConfig {
    let path = dir.path().join("fake-worker.sh");
    std::fs::write(&path, script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    WorkerConfig {
        candidates: vec![path.to_str().unwrap().to_string()],
        working_dir: Utf8PathBuf::from(dir.path().to_str().unwrap()),
        shutdown_grace: Duration::from_millis(300),
    }
}

async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Event channel closed")
}

/// A worker that speaks the protocol properly, with one garbage line mixed
/// into its output.
const COOPERATIVE_WORKER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"cmd":"scan"'*)
      printf '%s\n' '{"event":"status","message":"Scanning for images..."}'
      printf '%s\n' 'this is not a protocol line'
      printf '%s\n' '{"event":"progress","current":50,"total":200}'
      printf '%s\n' '{"event":"complete","summary":"Done! 198 kept, 2 skipped","errors":0}'
      ;;
    *'"cmd":"cancel"'*) printf '%s\n' '{"event":"cancelled"}' ;;
    *'"cmd":"quit"'*) exit 0 ;;
  esac
done
"#;

/// A worker that ignores every command, including quit.
const STUBBORN_WORKER: &str = r#"#!/bin/sh
while IFS= read -r line; do :; done
sleep 60
"#;

/// A worker that dies mid-scan without a terminal event.
const CRASHING_WORKER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"cmd":"scan"'*)
      printf '%s\n' '{"event":"status","message":"starting"}'
      exit 3
      ;;
    *'"cmd":"quit"'*) exit 0 ;;
  esac
done
"#;

/// A worker that complains on stderr before completing.
const NOISY_WORKER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"cmd":"scan"'*)
      echo 'Access denied: /photos/locked' >&2
      printf '%s\n' '{"event":"complete","summary":"Scanned 0 images.","errors":1}'
      ;;
    *'"cmd":"quit"'*) exit 0 ;;
  esac
done
"#;

fn scan_command() -> Command {
    Command::Scan {
        source: "/photos".into(),
        output: "/dupes".into(),
        threshold: 20,
    }
}

#[tokio::test]
async fn test_first_send_spawns_worker_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let supervisor = WorkerSupervisor::new(fake_worker(&dir, COOPERATIVE_WORKER));
    let mut rx = supervisor.subscribe();

    assert!(!supervisor.is_running().await);
    supervisor.send(&scan_command()).await.unwrap();
    assert!(supervisor.is_running().await);

    // Events arrive in emission order; the garbage line is dropped.
    assert_eq!(
        next_event(&mut rx).await,
        Event::Status {
            message: "Scanning for images...".to_string()
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        Event::Progress {
            current: 50,
            total: 200
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        Event::Complete {
            summary: "Done! 198 kept, 2 skipped".to_string(),
            errors: 0
        }
    );

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_ensure_started_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let supervisor = WorkerSupervisor::new(fake_worker(&dir, COOPERATIVE_WORKER));
    let mut rx = supervisor.subscribe();

    supervisor.ensure_started().await.unwrap();
    supervisor.ensure_started().await.unwrap();
    assert!(supervisor.is_running().await);

    // Exactly one worker answers.
    supervisor.send(&Command::Cancel).await.unwrap();
    assert_eq!(next_event(&mut rx).await, Event::Cancelled);
    assert!(
        timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
        "Expected no duplicate events from a second worker"
    );

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_stderr_surfaces_as_error_events() {
    let dir = TempDir::new().unwrap();
    let supervisor = WorkerSupervisor::new(fake_worker(&dir, NOISY_WORKER));
    let mut rx = supervisor.subscribe();

    supervisor.send(&scan_command()).await.unwrap();

    let mut saw_stderr = false;
    let mut saw_complete = false;
    // stderr interleaves with stdout in arrival order, so accept either
    // ordering of the two.
    for _ in 0..2 {
        match next_event(&mut rx).await {
            Event::Error { message } => {
                assert_eq!(message, "Access denied: /photos/locked");
                saw_stderr = true;
            }
            Event::Complete { errors, .. } => {
                assert_eq!(errors, 1);
                saw_complete = true;
            }
            other => panic!("Unexpected event: {other:?}"),
        }
    }
    assert!(saw_stderr && saw_complete);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_graceful_shutdown_emits_exit_event() {
    let dir = TempDir::new().unwrap();
    let supervisor = WorkerSupervisor::new(fake_worker(&dir, COOPERATIVE_WORKER));
    let mut rx = supervisor.subscribe();

    supervisor.ensure_started().await.unwrap();
    supervisor.shutdown().await;

    assert_eq!(next_event(&mut rx).await, Event::ProcessExit { code: 0 });
    assert!(!supervisor.is_running().await);
}

#[tokio::test]
async fn test_forced_kill_after_grace_deadline() {
    let dir = TempDir::new().unwrap();
    let config = fake_worker(&dir, STUBBORN_WORKER);
    let grace = config.shutdown_grace;
    let supervisor = WorkerSupervisor::new(config);
    let mut rx = supervisor.subscribe();

    supervisor.ensure_started().await.unwrap();

    let start = Instant::now();
    supervisor.shutdown().await;
    let elapsed = start.elapsed();

    // The worker ignored quit, so shutdown waited out the grace period and
    // then killed it, all within a bounded time.
    assert!(elapsed >= grace, "Shutdown returned before the deadline");
    assert!(
        elapsed < grace + Duration::from_secs(2),
        "Shutdown took too long: {elapsed:?}"
    );

    assert_eq!(
        next_event(&mut rx).await,
        Event::ProcessExit {
            code: KILLED_EXIT_CODE
        }
    );
    assert!(!supervisor.is_running().await);

    // A fresh worker can be spawned afterwards.
    supervisor.ensure_started().await.unwrap();
    assert!(supervisor.is_running().await);
    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_respawn_after_unexpected_exit() {
    let dir = TempDir::new().unwrap();
    let supervisor = WorkerSupervisor::new(fake_worker(&dir, CRASHING_WORKER));
    let mut rx = supervisor.subscribe();

    supervisor.send(&scan_command()).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        Event::Status {
            message: "starting".to_string()
        }
    );
    assert_eq!(next_event(&mut rx).await, Event::ProcessExit { code: 3 });

    // The dead handle is cleared; the next command spawns fresh rather
    // than writing into a broken pipe.
    supervisor.send(&scan_command()).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        Event::Status {
            message: "starting".to_string()
        }
    );

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent_with_live_worker() {
    let dir = TempDir::new().unwrap();
    let supervisor = WorkerSupervisor::new(fake_worker(&dir, COOPERATIVE_WORKER));

    supervisor.ensure_started().await.unwrap();
    supervisor.shutdown().await;
    supervisor.shutdown().await;
    assert!(!supervisor.is_running().await);
}
