//! Draw Plans
//!
//! The three submission strategies consume the same plan:
//! - direct and bundle paths walk [`DrawItem`]s, one bind + indexed draw each
//! - the indirect path uploads [`IndirectLayout::args`], one record per object,
//!   drawing from geometry merged into a single vertex/index buffer pair
//!
//! [`DrawRecorder`] lets the direct loop record into either a render pass or
//! a render bundle encoder.

use std::ops::Range;

use crate::renderer::uniforms::{CONSTANT_ALIGNMENT, DrawIndexedArgs};
use crate::scene::MeshView;

// ============================================================================
// Direct plan
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    /// Object (and mesh) index, in insertion order.
    pub object: u32,
    /// Offset of the object's constants in the frame slot's constant buffer.
    pub dynamic_offset: u32,
    pub index_count: u32,
    pub vertex_stride: u32,
}

/// One draw per mesh, in insertion order.
#[must_use]
pub fn direct_plan(meshes: &[MeshView]) -> Vec<DrawItem> {
    meshes
        .iter()
        .enumerate()
        .map(|(object, mesh)| DrawItem {
            object: object as u32,
            dynamic_offset: (object as u64 * CONSTANT_ALIGNMENT) as u32,
            index_count: mesh.index_count,
            vertex_stride: mesh.vertex_stride,
        })
        .collect()
}

// ============================================================================
// Indirect plan
// ============================================================================

/// Where a mesh lands inside the merged buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshPlacement {
    pub vertex_offset: u64,
    pub vertex_bytes: u64,
    pub index_offset: u64,
    pub index_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectLayout {
    pub vertex_stride: u32,
    pub placements: Vec<MeshPlacement>,
    pub args: Vec<DrawIndexedArgs>,
    pub vertex_bytes: u64,
    pub index_bytes: u64,
}

impl IndirectLayout {
    /// Lays every mesh out back to back. Returns `None` for an empty set or
    /// when meshes disagree on vertex stride, since one indirect draw binds a
    /// single vertex layout.
    #[must_use]
    pub fn build(meshes: &[MeshView]) -> Option<Self> {
        let vertex_stride = meshes.first()?.vertex_stride;
        if meshes.iter().any(|m| m.vertex_stride != vertex_stride) {
            return None;
        }

        let mut placements = Vec::with_capacity(meshes.len());
        let mut args = Vec::with_capacity(meshes.len());
        let mut base_vertex = 0u32;
        let mut first_index = 0u32;
        let mut vertex_bytes = 0u64;
        let mut index_bytes = 0u64;

        for (object, mesh) in meshes.iter().enumerate() {
            placements.push(MeshPlacement {
                vertex_offset: vertex_bytes,
                vertex_bytes: mesh.vertex_bytes(),
                index_offset: index_bytes,
                index_bytes: mesh.index_bytes(),
            });
            args.push(DrawIndexedArgs {
                index_count: mesh.index_count,
                instance_count: 1,
                first_index,
                base_vertex: base_vertex as i32,
                first_instance: object as u32,
            });

            base_vertex += mesh.vertex_count;
            first_index += mesh.index_count;
            vertex_bytes += mesh.vertex_bytes();
            index_bytes += mesh.index_bytes();
        }

        Some(Self {
            vertex_stride,
            placements,
            args,
            vertex_bytes,
            index_bytes,
        })
    }

    #[inline]
    #[must_use]
    pub fn draw_count(&self) -> u32 {
        self.args.len() as u32
    }
}

// ============================================================================
// DrawRecorder
// ============================================================================

/// Common recording surface of render passes and render bundle encoders.
pub trait DrawRecorder<'a> {
    fn set_pipeline(&mut self, pipeline: &'a wgpu::RenderPipeline);
    fn set_bind_group(&mut self, index: u32, group: &'a wgpu::BindGroup, offsets: &[u32]);
    fn set_vertex_buffer(&mut self, slot: u32, slice: wgpu::BufferSlice<'a>);
    fn set_index_buffer(&mut self, slice: wgpu::BufferSlice<'a>, format: wgpu::IndexFormat);
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

impl<'a> DrawRecorder<'a> for wgpu::RenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: &'a wgpu::RenderPipeline) {
        wgpu::RenderPass::set_pipeline(self, pipeline);
    }

    fn set_bind_group(&mut self, index: u32, group: &'a wgpu::BindGroup, offsets: &[u32]) {
        wgpu::RenderPass::set_bind_group(self, index, group, offsets);
    }

    fn set_vertex_buffer(&mut self, slot: u32, slice: wgpu::BufferSlice<'a>) {
        wgpu::RenderPass::set_vertex_buffer(self, slot, slice);
    }

    fn set_index_buffer(&mut self, slice: wgpu::BufferSlice<'a>, format: wgpu::IndexFormat) {
        wgpu::RenderPass::set_index_buffer(self, slice, format);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        wgpu::RenderPass::draw_indexed(self, indices, base_vertex, instances);
    }
}

impl<'a> DrawRecorder<'a> for wgpu::RenderBundleEncoder<'a> {
    fn set_pipeline(&mut self, pipeline: &'a wgpu::RenderPipeline) {
        wgpu::RenderBundleEncoder::set_pipeline(self, pipeline);
    }

    fn set_bind_group(&mut self, index: u32, group: &'a wgpu::BindGroup, offsets: &[u32]) {
        wgpu::RenderBundleEncoder::set_bind_group(self, index, group, offsets);
    }

    fn set_vertex_buffer(&mut self, slot: u32, slice: wgpu::BufferSlice<'a>) {
        wgpu::RenderBundleEncoder::set_vertex_buffer(self, slot, slice);
    }

    fn set_index_buffer(&mut self, slice: wgpu::BufferSlice<'a>, format: wgpu::IndexFormat) {
        wgpu::RenderBundleEncoder::set_index_buffer(self, slice, format);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        wgpu::RenderBundleEncoder::draw_indexed(self, indices, base_vertex, instances);
    }
}
