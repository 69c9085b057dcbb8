//! Shadow Worker Tests
//!
//! Tests for:
//! - Request delivery and coalescing with one pending slot
//! - Shutdown running the pending request before joining
//! - Idempotent shutdown and requests after shutdown
//! - Render timing, skipped for failed passes

use std::time::Duration;

use async_shadow::worker::{RenderTimer, RequestOutcome, ShadowWorker};
use async_shadow::ShadowError;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Worker whose job reports when it starts and then blocks on a gate.
fn gated_worker() -> (ShadowWorker, flume::Receiver<()>, flume::Sender<()>) {
    let (started_tx, started_rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::unbounded::<()>();

    let worker = ShadowWorker::spawn(move || {
        let _ = started_tx.send(());
        let _ = gate_rx.recv();
    })
    .unwrap();

    (worker, started_rx, gate_tx)
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn idle_worker_runs_request() {
    let (done_tx, done_rx) = flume::unbounded();
    let worker = ShadowWorker::spawn(move || {
        let _ = done_tx.send(());
    })
    .unwrap();

    assert_eq!(worker.request().unwrap(), RequestOutcome::Queued);
    done_rx.recv_timeout(TIMEOUT).expect("job did not run");
}

#[test]
fn requests_while_busy_coalesce_into_one() {
    let (mut worker, started, gate) = gated_worker();

    assert_eq!(worker.request().unwrap(), RequestOutcome::Queued);
    started.recv_timeout(TIMEOUT).expect("first job did not start");

    // Worker is busy: one request fits in the pending slot, the rest merge.
    assert_eq!(worker.request().unwrap(), RequestOutcome::Queued);
    assert_eq!(worker.request().unwrap(), RequestOutcome::Coalesced);
    assert_eq!(worker.request().unwrap(), RequestOutcome::Coalesced);

    gate.send(()).unwrap();
    gate.send(()).unwrap();
    worker.shutdown();

    assert_eq!(worker.completed(), 2);
}

#[test]
fn shutdown_runs_pending_request() {
    let (mut worker, started, gate) = gated_worker();

    worker.request().unwrap();
    started.recv_timeout(TIMEOUT).unwrap();
    worker.request().unwrap();

    // Both jobs may proceed; shutdown must not drop the queued one.
    gate.send(()).unwrap();
    gate.send(()).unwrap();
    worker.shutdown();

    assert_eq!(started.drain().count(), 1);
    assert_eq!(worker.completed(), 2);
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn shutdown_is_idempotent() {
    let mut worker = ShadowWorker::spawn(|| {}).unwrap();
    assert!(worker.is_running());

    worker.shutdown();
    worker.shutdown();
    assert!(!worker.is_running());
}

#[test]
fn request_after_shutdown_fails() {
    let mut worker = ShadowWorker::spawn(|| {}).unwrap();
    worker.shutdown();
    assert!(matches!(worker.request(), Err(ShadowError::WorkerDisconnected)));
}

#[test]
fn dropping_worker_joins_thread() {
    let (done_tx, done_rx) = flume::unbounded();
    {
        let worker = ShadowWorker::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let _ = done_tx.send(());
        })
        .unwrap();
        worker.request().unwrap();
    }
    // Drop joined after running the queued job.
    assert!(done_rx.try_recv().is_ok());
}

// ============================================================================
// Timing
// ============================================================================

#[test]
fn timer_starts_at_zero() {
    assert_eq!(RenderTimer::new().last_ms(), 0.0);
}

#[test]
fn timer_records_milliseconds() {
    let timer = RenderTimer::new();
    timer.record(Duration::from_millis(250));
    assert!((timer.last_ms() - 250.0).abs() < 1e-9);
}

#[test]
fn timer_measures_closure() {
    let timer = RenderTimer::new();
    let value = timer.measure(|| {
        std::thread::sleep(Duration::from_millis(5));
        Ok::<_, ShadowError>(42)
    });
    assert_eq!(value.unwrap(), 42);
    assert!(timer.last_ms() >= 5.0, "measured {}", timer.last_ms());
}

#[test]
fn failed_pass_keeps_previous_time() {
    let timer = RenderTimer::new();
    timer.record(Duration::from_millis(3));

    let result: Result<(), ShadowError> = timer.measure(|| {
        std::thread::sleep(Duration::from_millis(20));
        Err(ShadowError::NotConfigured)
    });
    assert!(matches!(result, Err(ShadowError::NotConfigured)));
    assert!((timer.last_ms() - 3.0).abs() < 1e-9, "measured {}", timer.last_ms());
}
