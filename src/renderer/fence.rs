//! GPU/CPU fences.
//!
//! [`GpuFence`] is the monotonically increasing counter the frame ring paces
//! itself with. [`QueueFence`] implements it over a wgpu queue: every
//! `signal` is an empty submission whose [`wgpu::SubmissionIndex`] stands in
//! for the fence value, and completion is reported through
//! `on_submitted_work_done`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::Result;

/// A counter the GPU advances as submitted work completes.
pub trait GpuFence: Send {
    /// Enqueues a signal of `value` behind all work submitted so far.
    fn signal(&mut self, value: u64) -> Result<()>;

    /// Highest value the GPU has reached.
    fn completed_value(&self) -> u64;

    /// Blocks until `completed_value() >= value`. No timeout.
    ///
    /// Returns immediately when `value` was never signaled.
    fn wait_for(&mut self, value: u64) -> Result<()>;
}

/// Fence emulated on a wgpu queue.
pub struct QueueFence {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pending: VecDeque<(u64, wgpu::SubmissionIndex)>,
    completed: Arc<AtomicU64>,
}

impl QueueFence {
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            pending: VecDeque::new(),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Signals still tracked. Completed entries are dropped on the next
    /// `signal` or `wait_for`.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn retire(&mut self) {
        let done = self.completed.load(Ordering::Acquire);
        while self.pending.front().is_some_and(|(v, _)| *v <= done) {
            self.pending.pop_front();
        }
    }
}

impl GpuFence for QueueFence {
    fn signal(&mut self, value: u64) -> Result<()> {
        self.retire();
        let index = self.queue.submit(std::iter::empty());

        let completed = Arc::clone(&self.completed);
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(value, Ordering::AcqRel);
        });

        self.pending.push_back((value, index));
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait_for(&mut self, value: u64) -> Result<()> {
        if self.completed_value() >= value {
            self.retire();
            return Ok(());
        }

        let Some((signaled, index)) = self
            .pending
            .iter()
            .find(|(v, _)| *v >= value)
            .map(|(v, i)| (*v, i.clone()))
        else {
            return Ok(());
        };

        self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        })?;

        // The callback fires during poll; record completion regardless of
        // callback ordering.
        self.completed.fetch_max(signaled, Ordering::AcqRel);
        self.retire();
        Ok(())
    }
}
