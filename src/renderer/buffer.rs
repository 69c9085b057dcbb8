//! Buffer Abstractions
//!
//! Two wrappers over `wgpu::Buffer`, each the single owner of its device
//! resource (move-only, destroyed on drop):
//!
//! - [`UploadBuffer<T>`]: host-writable array of `T`. Writes land in a CPU
//!   mirror ([`StagingArray`]) and reach the GPU on [`UploadBuffer::flush`],
//!   which only uploads the dirty byte range.
//! - [`DefaultBuffer<T>`]: GPU-resident array filled once through a staging
//!   copy, then moved into its steady-state usage.

use std::marker::PhantomData;
use std::ops::Range;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::renderer::uniforms::constant_stride;

// ============================================================================
// StagingArray
// ============================================================================

/// CPU-side byte image of an upload buffer.
///
/// Element `i` lives at `i * stride`. For constant buffers the stride is
/// rounded up to 256 bytes.
#[derive(Debug)]
pub struct StagingArray<T: Pod> {
    bytes: Vec<u8>,
    stride: u64,
    len: usize,
    dirty: Option<Range<u64>>,
    _marker: PhantomData<T>,
}

impl<T: Pod> StagingArray<T> {
    #[must_use]
    pub fn new(len: usize, is_constant_buffer: bool) -> Self {
        let stride = if is_constant_buffer {
            constant_stride::<T>()
        } else {
            std::mem::size_of::<T>() as u64
        };
        Self {
            bytes: vec![0; (stride * len as u64) as usize],
            stride,
            len,
            dirty: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Writes `value` at `index * stride`. Indices past the end are dropped.
    pub fn copy_data(&mut self, index: usize, value: &T) {
        if index >= self.len {
            log::warn!("StagingArray write at {index} ignored (len {})", self.len);
            return;
        }
        let start = index as u64 * self.stride;
        let src = bytemuck::bytes_of(value);
        let end = start + src.len() as u64;
        self.bytes[start as usize..end as usize].copy_from_slice(src);

        self.dirty = Some(match self.dirty.take() {
            Some(r) => r.start.min(start)..r.end.max(end),
            None => start..end,
        });
    }

    /// Reads element `index` back out of the mirror.
    #[must_use]
    pub fn read(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let start = (index as u64 * self.stride) as usize;
        let size = std::mem::size_of::<T>();
        Some(bytemuck::pod_read_unaligned(&self.bytes[start..start + size]))
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn dirty_range(&self) -> Option<Range<u64>> {
        self.dirty.clone()
    }

    /// Returns and clears the pending dirty range, widened to 4-byte bounds.
    pub fn take_dirty(&mut self) -> Option<Range<u64>> {
        self.dirty
            .take()
            .map(|r| (r.start & !3)..((r.end + 3) & !3).min(self.byte_size()))
    }
}

// ============================================================================
// UploadBuffer
// ============================================================================

/// Host-writable, GPU-readable array of `T`.
///
/// Writes are unsynchronized with respect to the GPU; frame-slot isolation
/// guarantees nothing reads the slot being written.
pub struct UploadBuffer<T: Pod> {
    staging: StagingArray<T>,
    buffer: wgpu::Buffer,
}

impl<T: Pod> UploadBuffer<T> {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        len: usize,
        is_constant_buffer: bool,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let staging = StagingArray::new(len, is_constant_buffer);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: staging.byte_size().max(4),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { staging, buffer }
    }

    #[inline]
    pub fn copy_data(&mut self, index: usize, value: &T) {
        self.staging.copy_data(index, value);
    }

    #[inline]
    #[must_use]
    pub fn read(&self, index: usize) -> Option<T> {
        self.staging.read(index)
    }

    /// Uploads pending writes. Returns the number of bytes written.
    pub fn flush(&mut self, queue: &wgpu::Queue) -> u64 {
        let Some(range) = self.staging.take_dirty() else {
            return 0;
        };
        let bytes = &self.staging.as_bytes()[range.start as usize..range.end as usize];
        queue.write_buffer(&self.buffer, range.start, bytes);
        range.end - range.start
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> u64 {
        self.staging.stride()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.staging.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn staging(&self) -> &StagingArray<T> {
        &self.staging
    }

    #[inline]
    pub fn staging_mut(&mut self) -> &mut StagingArray<T> {
        &mut self.staging
    }
}

impl<T: Pod> Drop for UploadBuffer<T> {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

// ============================================================================
// DefaultBuffer
// ============================================================================

/// Usage state of a [`DefaultBuffer`]. wgpu inserts the real barriers; this
/// ledger enforces the upload-then-consume order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    CopyDest,
    IndirectArgument,
    VertexAndIndex,
}

/// GPU-resident array of `T`, not visible to the CPU.
pub struct DefaultBuffer<T: Pod> {
    buffer: wgpu::Buffer,
    len: usize,
    state: BufferState,
    _marker: PhantomData<T>,
}

impl<T: Pod> DefaultBuffer<T> {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        len: usize,
        usage: wgpu::BufferUsages,
        initial_state: BufferState,
    ) -> Self {
        let size = (std::mem::size_of::<T>() * len) as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align_copy(size).max(4),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            len,
            state: initial_state,
            _marker: PhantomData,
        }
    }

    /// Records a copy of `data` into this buffer through a temporary upload
    /// buffer. The returned staging buffer must stay alive until the GPU has
    /// consumed the copy.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        data: &[T],
        steady_state: BufferState,
    ) -> wgpu::Buffer {
        debug_assert_eq!(self.state, BufferState::CopyDest);
        debug_assert!(data.len() <= self.len);

        let mut contents = bytemuck::cast_slice::<T, u8>(data).to_vec();
        contents.resize(align_copy(contents.len() as u64) as usize, 0);
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Default Buffer Staging"),
            contents: &contents,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        encoder.copy_buffer_to_buffer(&staging, 0, &self.buffer, 0, contents.len() as u64);
        self.transition(steady_state);
        staging
    }

    /// Records a GPU-to-GPU copy of `size` bytes into this buffer at `offset`.
    pub fn copy_region(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Buffer,
        source_offset: u64,
        offset: u64,
        size: u64,
    ) {
        debug_assert_eq!(self.state, BufferState::CopyDest);
        encoder.copy_buffer_to_buffer(source, source_offset, &self.buffer, offset, size);
    }

    #[inline]
    pub fn transition(&mut self, state: BufferState) {
        self.state = state;
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> BufferState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Pod> Drop for DefaultBuffer<T> {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

#[inline]
fn align_copy(size: u64) -> u64 {
    (size + wgpu::COPY_BUFFER_ALIGNMENT - 1) & !(wgpu::COPY_BUFFER_ALIGNMENT - 1)
}
