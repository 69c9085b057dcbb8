//! Shadow Scene State
//!
//! CPU-side state the shadow pass renders from:
//! - [`MeshView`]: read-only geometry metadata for each registered mesh
//! - per-object state (world matrix + cutout texture index), one per mesh
//! - the single shadow (light view-projection) transform
//! - [`CutoutTable`]: the fixed-capacity cutout texture list
//!
//! GPU handles live with the pass; this module holds no device resources and
//! is shared between the host thread (setters) and whichever thread updates
//! constant buffers.

use glam::Mat4;

use crate::errors::{Result, ShadowError};
use crate::renderer::buffer::StagingArray;
use crate::renderer::uniforms::{LightConstants, MAX_TEXTURES, NO_TEXTURE, ObjectConstants};

/// Smallest vertex stride holding position, normal and uv.
pub const MIN_VERTEX_STRIDE: u32 = 32;

/// Bytes per index (`u32`).
pub const INDEX_SIZE: u64 = 4;

// ============================================================================
// MeshView
// ============================================================================

/// Geometry metadata derived from a host mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshView {
    pub vertex_stride: u32,
    pub vertex_count: u32,
    pub index_count: u32,
}

impl MeshView {
    /// Derives the view from buffer sizes.
    ///
    /// The stride is `vertex_buffer_size / vertex_count`. An `index_count` of
    /// zero means "the whole index buffer".
    pub fn from_sizes(
        vertex_buffer_size: u64,
        vertex_count: u32,
        index_buffer_size: u64,
        index_count: u32,
    ) -> Result<Self> {
        if vertex_count == 0 {
            return Err(ShadowError::InvalidArgument("vertex count is zero".into()));
        }

        let vertex_stride = (vertex_buffer_size / u64::from(vertex_count)) as u32;
        if vertex_stride < MIN_VERTEX_STRIDE || vertex_stride % 4 != 0 {
            return Err(ShadowError::InvalidArgument(format!(
                "vertex stride {vertex_stride} must be a multiple of 4 and at least {MIN_VERTEX_STRIDE} bytes"
            )));
        }

        let available = (index_buffer_size / INDEX_SIZE) as u32;
        let index_count = if index_count == 0 { available } else { index_count };
        if index_count == 0 || index_count > available {
            return Err(ShadowError::InvalidArgument(format!(
                "index count {index_count} does not fit a {index_buffer_size}-byte index buffer"
            )));
        }

        Ok(Self {
            vertex_stride,
            vertex_count,
            index_count,
        })
    }

    #[inline]
    #[must_use]
    pub fn vertex_bytes(&self) -> u64 {
        u64::from(self.vertex_stride) * u64::from(self.vertex_count)
    }

    #[inline]
    #[must_use]
    pub fn index_bytes(&self) -> u64 {
        u64::from(self.index_count) * INDEX_SIZE
    }
}

// ============================================================================
// Object state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectState {
    pub world: Mat4,
    pub tex_index: u32,
}

impl Default for ObjectState {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            tex_index: NO_TEXTURE,
        }
    }
}

impl ObjectState {
    #[inline]
    #[must_use]
    pub fn constants(&self) -> ObjectConstants {
        ObjectConstants::new(self.world, self.tex_index)
    }
}

// ============================================================================
// ShadowScene
// ============================================================================

#[derive(Debug, Default)]
pub struct ShadowScene {
    meshes: Vec<MeshView>,
    objects: Vec<ObjectState>,
    shadow_transform: Mat4,
    sealed: bool,
}

impl ShadowScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mesh and its object slot. Returns the object index.
    pub fn add_mesh(&mut self, view: MeshView) -> Result<usize> {
        if self.sealed {
            return Err(ShadowError::MeshSetSealed);
        }
        self.meshes.push(view);
        self.objects.push(ObjectState::default());
        Ok(self.meshes.len() - 1)
    }

    /// Fixes the mesh count so constant buffers can be sized.
    pub fn seal(&mut self) -> Result<usize> {
        if self.meshes.is_empty() {
            return Err(ShadowError::NoMeshes);
        }
        self.sealed = true;
        Ok(self.meshes.len())
    }

    #[inline]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    #[inline]
    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    #[must_use]
    pub fn meshes(&self) -> &[MeshView] {
        &self.meshes
    }

    #[inline]
    #[must_use]
    pub fn object(&self, index: usize) -> Option<&ObjectState> {
        self.objects.get(index)
    }

    /// Replaces the world matrix of `index`. Out-of-range indices are ignored.
    pub fn set_object_transform(&mut self, index: usize, world: Mat4) -> bool {
        match self.objects.get_mut(index) {
            Some(object) => {
                object.world = world;
                true
            }
            None => false,
        }
    }

    /// Sets the cutout slot of `index`; negative values mean opaque.
    /// Out-of-range indices are ignored.
    pub fn set_obj_texture_index(&mut self, index: usize, tex_index: i32) -> bool {
        match self.objects.get_mut(index) {
            Some(object) => {
                object.tex_index = u32::try_from(tex_index).unwrap_or(NO_TEXTURE);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn set_shadow_transform(&mut self, view_proj: Mat4) {
        self.shadow_transform = view_proj;
    }

    #[inline]
    #[must_use]
    pub fn shadow_transform(&self) -> Mat4 {
        self.shadow_transform
    }

    /// Copies every object and the light transform into a frame slot's
    /// constant mirrors.
    pub fn write_constants(
        &self,
        objects: &mut StagingArray<ObjectConstants>,
        light: &mut StagingArray<LightConstants>,
    ) {
        for (index, object) in self.objects.iter().enumerate() {
            objects.copy_data(index, &object.constants());
        }
        light.copy_data(0, &LightConstants::new(self.shadow_transform));
    }
}

// ============================================================================
// CutoutTable
// ============================================================================

/// What a descriptor-table slot is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoutSlot {
    /// The `n`-th registered cutout texture.
    Bound(usize),
    /// The placeholder texture.
    Placeholder,
}

/// Ordered cutout textures, capped at [`MAX_TEXTURES`].
#[derive(Debug)]
pub struct CutoutTable<T> {
    entries: Vec<T>,
}

impl<T> Default for CutoutTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_TEXTURES),
        }
    }
}

impl<T> CutoutTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`. Returns `false` (entry dropped) once the table is full.
    pub fn push(&mut self, entry: T) -> bool {
        if self.entries.len() >= MAX_TEXTURES {
            log::warn!("Cutout table full ({MAX_TEXTURES}); texture ignored");
            return false;
        }
        self.entries.push(entry);
        true
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn slots(&self) -> [CutoutSlot; MAX_TEXTURES] {
        std::array::from_fn(|i| {
            if i < self.entries.len() {
                CutoutSlot::Bound(i)
            } else {
                CutoutSlot::Placeholder
            }
        })
    }

    /// The full table with unused slots filled by `placeholder`.
    #[must_use]
    pub fn resolve<'a>(&'a self, placeholder: &'a T) -> [&'a T; MAX_TEXTURES] {
        self.slots().map(|slot| match slot {
            CutoutSlot::Bound(i) => &self.entries[i],
            CutoutSlot::Placeholder => placeholder,
        })
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
