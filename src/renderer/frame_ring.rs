//! Frame Resource Ring
//!
//! Fence bookkeeping for [`FRAME_COUNT`] rotating frame slots. A slot's
//! resources may be rewritten only once the fence has reached the value last
//! signaled on that slot's behalf; [`FrameRing::advance`] enforces this before
//! handing the next slot out.
//!
//! The per-slot resources themselves live with their owner (see
//! [`ShadowPass`](crate::renderer::shadow_pass::ShadowPass)), indexed by
//! [`FrameRing::current`].

use crate::errors::Result;
use crate::renderer::fence::GpuFence;
use crate::renderer::uniforms::FRAME_COUNT;

pub struct FrameRing<F: GpuFence> {
    fence: Option<F>,
    /// Value the next signal for each slot will use.
    fence_values: [u64; FRAME_COUNT],
    /// Value last signaled on behalf of each slot (0 = never).
    signaled: [u64; FRAME_COUNT],
    current: usize,
}

impl<F: GpuFence> Default for FrameRing<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: GpuFence> FrameRing<F> {
    /// A ring with no fence; every wait is a no-op until [`attach`](Self::attach).
    #[must_use]
    pub fn new() -> Self {
        Self {
            fence: None,
            fence_values: [1; FRAME_COUNT],
            signaled: [0; FRAME_COUNT],
            current: 0,
        }
    }

    /// Installs the fence and resets the counters.
    pub fn attach(&mut self, fence: F) {
        self.fence = Some(fence);
        self.reset();
    }

    /// Resets counters and the slot cursor, keeping the fence.
    pub fn reset(&mut self) {
        self.fence_values = [1; FRAME_COUNT];
        self.signaled = [0; FRAME_COUNT];
        self.current = 0;
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    #[must_use]
    pub fn has_fence(&self) -> bool {
        self.fence.is_some()
    }

    #[inline]
    #[must_use]
    pub fn fence_values(&self) -> [u64; FRAME_COUNT] {
        self.fence_values
    }

    #[inline]
    #[must_use]
    pub fn completed_value(&self) -> u64 {
        self.fence.as_ref().map_or(0, |f| f.completed_value())
    }

    #[must_use]
    pub fn fence(&self) -> Option<&F> {
        self.fence.as_ref()
    }

    /// True when no GPU work signaled for `slot` is outstanding.
    #[must_use]
    pub fn is_slot_available(&self, slot: usize) -> bool {
        self.completed_value() >= self.signaled[slot % FRAME_COUNT]
    }

    /// Signals the current slot, rotates, and blocks until the new slot's
    /// previous work is complete. Returns the new slot index.
    pub fn advance(&mut self) -> Result<usize> {
        let Some(fence) = self.fence.as_mut() else {
            self.current = (self.current + 1) % FRAME_COUNT;
            return Ok(self.current);
        };

        let value = self.fence_values[self.current];
        fence.signal(value)?;
        self.signaled[self.current] = value;

        self.current = (self.current + 1) % FRAME_COUNT;

        let pending = self.signaled[self.current];
        if pending > 0 && fence.completed_value() < pending {
            fence.wait_for(pending)?;
        }
        self.fence_values[self.current] = value + 1;

        Ok(self.current)
    }

    /// Synchronously drains `slot`: signal, wait, bump its value.
    pub fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        let slot = slot % FRAME_COUNT;
        let Some(fence) = self.fence.as_mut() else {
            return Ok(());
        };

        let value = self.fence_values[slot];
        fence.signal(value)?;
        self.signaled[slot] = value;
        fence.wait_for(value)?;
        self.fence_values[slot] += 1;
        Ok(())
    }

    /// Waits for every slot.
    pub fn drain(&mut self) -> Result<()> {
        for slot in 0..FRAME_COUNT {
            self.wait_for_slot(slot)?;
        }
        Ok(())
    }

    /// Drains and removes the fence.
    pub fn detach(&mut self) -> Result<Option<F>> {
        self.drain()?;
        Ok(self.fence.take())
    }
}
