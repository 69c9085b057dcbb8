//! GPU-visible data layouts shared with `shadow.wgsl`.
//!
//! Constant-bearing structs are padded to exactly [`CONSTANT_ALIGNMENT`] so a
//! dynamic offset of `index * 256` addresses element `index`, both as a
//! uniform binding and as an element of the storage array read by the
//! indirect path.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Number of frame slots in flight.
pub const FRAME_COUNT: usize = 3;

/// Capacity of the cutout texture table.
pub const MAX_TEXTURES: usize = 16;

/// Hardware constant-buffer offset alignment.
pub const CONSTANT_ALIGNMENT: u64 = 256;

/// Texture index meaning "no cutout texture; opaque".
pub const NO_TEXTURE: u32 = u32::MAX;

#[inline]
#[must_use]
pub const fn align_to(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Byte stride of one element of a constant buffer holding `T`.
#[inline]
#[must_use]
pub const fn constant_stride<T>() -> u64 {
    align_to(std::mem::size_of::<T>() as u64, CONSTANT_ALIGNMENT)
}

// ============================================================================
// Per-object constants
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: Mat4,
    pub tex_index: u32,
    pub _pad: [u32; 47],
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            tex_index: NO_TEXTURE,
            _pad: [0; 47],
        }
    }
}

impl ObjectConstants {
    #[inline]
    #[must_use]
    pub fn new(world: Mat4, tex_index: u32) -> Self {
        Self {
            world,
            tex_index,
            ..Default::default()
        }
    }
}

// ============================================================================
// Per-pass light constants
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    pub view_proj: Mat4,
    pub _pad: [u32; 48],
}

impl Default for LightConstants {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            _pad: [0; 48],
        }
    }
}

impl LightConstants {
    #[inline]
    #[must_use]
    pub fn new(view_proj: Mat4) -> Self {
        Self {
            view_proj,
            ..Default::default()
        }
    }
}

// ============================================================================
// Indirect argument record
// ============================================================================

/// One indexed draw as read by `multi_draw_indexed_indirect`.
///
/// The field order is fixed by the device; the buffer stride is
/// `size_of::<DrawIndexedArgs>()` and must match the draw call.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}
