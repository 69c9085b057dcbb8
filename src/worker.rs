//! Shadow Worker Thread
//!
//! A single background thread that runs the shadow job on request. Requests
//! travel over a depth-1 channel, so the worker is either idle (parked on
//! `recv`) or rendering with at most one request pending:
//!
//! | Worker state | Pending slot | `request()` result          |
//! |--------------|--------------|-----------------------------|
//! | idle         | empty        | `Queued` (wakes the worker) |
//! | rendering    | empty        | `Queued` (runs after)       |
//! | rendering    | full         | `Coalesced` (dropped)       |
//!
//! There is no cancellation: shutdown closes the channel, lets the pending
//! request (if any) run, then joins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::errors::{Result, ShadowError};

// ============================================================================
// Request outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request will produce a pass.
    Queued,
    /// A request was already pending; this one merged into it.
    Coalesced,
    /// Ran inline on the calling thread.
    Completed,
}

// ============================================================================
// RenderTimer
// ============================================================================

/// Last measured CPU duration of update + record + submit, in milliseconds.
#[derive(Debug, Default)]
pub struct RenderTimer {
    last_ms: AtomicU64,
}

impl RenderTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.last_ms.store(ms.to_bits(), Ordering::Release);
    }

    /// Runs `f` and records how long it took. Failed runs leave the last
    /// duration untouched.
    pub fn measure<T, E>(&self, f: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E> {
        let start = Instant::now();
        let result = f();
        if result.is_ok() {
            self.record(start.elapsed());
        }
        result
    }

    #[must_use]
    pub fn last_ms(&self) -> f64 {
        f64::from_bits(self.last_ms.load(Ordering::Acquire))
    }
}

// ============================================================================
// ShadowWorker
// ============================================================================

pub struct ShadowWorker {
    sender: Option<flume::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    completed: Arc<AtomicU64>,
}

impl ShadowWorker {
    /// Starts the worker thread. `job` runs once per delivered request.
    pub fn spawn<F>(mut job: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (sender, receiver) = flume::bounded::<()>(1);
        let completed = Arc::new(AtomicU64::new(0));
        let completed_in_thread = Arc::clone(&completed);

        let handle = thread::Builder::new()
            .name("shadow-worker".to_string())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    job();
                    completed_in_thread.fetch_add(1, Ordering::AcqRel);
                }
                log::debug!("Shadow worker exiting");
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            completed,
        })
    }

    /// Asks for one pass without waiting for it.
    pub fn request(&self) -> Result<RequestOutcome> {
        let sender = self.sender.as_ref().ok_or(ShadowError::WorkerDisconnected)?;
        match sender.try_send(()) {
            Ok(()) => Ok(RequestOutcome::Queued),
            Err(flume::TrySendError::Full(())) => {
                log::trace!("Shadow request coalesced with pending request");
                Ok(RequestOutcome::Coalesced)
            }
            Err(flume::TrySendError::Disconnected(())) => Err(ShadowError::WorkerDisconnected),
        }
    }

    /// Number of passes the worker has finished.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Closes the request channel and joins the thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Shadow worker panicked");
            }
        }
    }
}

impl Drop for ShadowWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
