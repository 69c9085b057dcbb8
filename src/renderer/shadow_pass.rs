//! Shadow Pass Engine
//!
//! Owns every device resource of the depth-only shadow pass and records it
//! with one of three strategies (see [`RenderMethod`]).
//!
//! # Setup chain
//!
//! [`ShadowPass::setup`] runs, stopping at the first failure:
//!
//! 1. depth view of the host target
//! 2. binding layout + sampler
//! 3. cutout table, padded with a placeholder
//! 4. direct pipelines, one per vertex stride
//! 5. per-slot constant buffers (fixes the mesh count)
//! 6. merged geometry + per-slot indirect arguments, uploaded through
//!    staging buffers, followed by a wait on every slot
//! 7. one render bundle per slot
//!
//! # Per frame
//!
//! [`ShadowPass::render_shadows`] updates the current slot's constants,
//! records clear + draws, submits, and advances the frame ring.

use smallvec::SmallVec;

use crate::errors::{Result, ShadowError};
use crate::renderer::buffer::{BufferState, DefaultBuffer, UploadBuffer};
use crate::renderer::draw::{DrawItem, DrawRecorder, IndirectLayout, direct_plan};
use crate::renderer::fence::QueueFence;
use crate::renderer::frame_ring::FrameRing;
use crate::renderer::pipeline::{PipelineCache, PipelineKey, ShadowLayout, VertexEntry};
use crate::renderer::uniforms::{DrawIndexedArgs, FRAME_COUNT, LightConstants, ObjectConstants};
use crate::scene::{CutoutTable, ShadowScene};
use crate::settings::{RenderMethod, ShadowSettings};

// ============================================================================
// Resource groups
// ============================================================================

/// Host-owned geometry of one mesh.
#[derive(Debug, Clone)]
pub struct MeshBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
}

struct DepthTarget {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl DepthTarget {
    fn new(texture: &wgpu::Texture) -> Result<Self> {
        let format = texture.format();
        if !format.has_depth_aspect() {
            return Err(ShadowError::InvalidArgument(format!(
                "shadow target format {format:?} has no depth aspect"
            )));
        }
        if !texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
            return Err(ShadowError::InvalidArgument(
                "shadow target lacks RENDER_ATTACHMENT usage".into(),
            ));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Depth View"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            array_layer_count: Some(1),
            mip_level_count: Some(1),
            ..Default::default()
        });

        Ok(Self {
            view,
            format,
            width: texture.width(),
            height: texture.height(),
        })
    }
}

/// Resources of one frame slot.
struct FrameResources {
    objects: UploadBuffer<ObjectConstants>,
    light: UploadBuffer<LightConstants>,
    bind_group: wgpu::BindGroup,
    bundle: Option<wgpu::RenderBundle>,
    indirect_args: Option<DefaultBuffer<DrawIndexedArgs>>,
}

/// All meshes copied back to back for the single indirect draw.
struct MergedGeometry {
    vertex: DefaultBuffer<u8>,
    index: DefaultBuffer<u32>,
    layout: IndirectLayout,
}

// ============================================================================
// ShadowPass
// ============================================================================

pub struct ShadowPass {
    device: wgpu::Device,
    queue: wgpu::Queue,
    settings: ShadowSettings,
    method: RenderMethod,

    ring: FrameRing<QueueFence>,

    meshes: Vec<MeshBuffers>,
    cutouts: CutoutTable<wgpu::TextureView>,
    placeholder: Option<wgpu::TextureView>,

    layout: Option<ShadowLayout>,
    pipelines: PipelineCache,
    target: Option<DepthTarget>,
    texture_group: Option<wgpu::BindGroup>,

    frames: Vec<FrameResources>,
    plan: Vec<DrawItem>,
    merged: Option<MergedGeometry>,
}

impl ShadowPass {
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        fence: QueueFence,
        settings: &ShadowSettings,
    ) -> Self {
        let mut ring = FrameRing::new();
        ring.attach(fence);

        Self {
            device: device.clone(),
            queue: queue.clone(),
            settings: settings.clone(),
            method: settings.render_method,
            ring,
            meshes: Vec::new(),
            cutouts: CutoutTable::new(),
            placeholder: None,
            layout: None,
            pipelines: PipelineCache::new(),
            target: None,
            texture_group: None,
            frames: Vec::with_capacity(FRAME_COUNT),
            plan: Vec::new(),
            merged: None,
        }
    }

    // ── Registration ──────────────────────────────────────────────────────

    pub fn add_mesh(&mut self, buffers: MeshBuffers) {
        self.meshes.push(buffers);
    }

    /// Appends a cutout texture. When the pass is already set up the table
    /// is rebound and the bundles re-recorded so the new slot is visible.
    pub fn add_cutout_texture(&mut self, texture: &wgpu::Texture) -> Result<bool> {
        if !texture.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(ShadowError::InvalidArgument(
                "cutout texture lacks TEXTURE_BINDING usage".into(),
            ));
        }
        if texture.format().is_depth_stencil_format() {
            return Err(ShadowError::InvalidArgument(
                "cutout texture must be a color texture".into(),
            ));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Cutout View"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            array_layer_count: Some(1),
            ..Default::default()
        });
        if !self.cutouts.push(view) {
            return Ok(false);
        }

        if self.texture_group.is_some() {
            self.create_texture_table()?;
            self.record_bundles()?;
        }
        Ok(true)
    }

    #[inline]
    pub fn set_render_method(&mut self, method: RenderMethod) {
        self.method = method;
    }

    #[inline]
    #[must_use]
    pub fn render_method(&self) -> RenderMethod {
        self.method
    }

    #[inline]
    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    #[must_use]
    pub fn cutout_count(&self) -> usize {
        self.cutouts.len()
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.target.is_some() && self.frames.len() == FRAME_COUNT
    }

    #[inline]
    #[must_use]
    pub fn indirect_available(&self) -> bool {
        self.merged.is_some()
    }

    #[inline]
    #[must_use]
    pub fn current_frame(&self) -> usize {
        self.ring.current()
    }

    /// CPU mirror of a slot's object constants, as last written.
    #[must_use]
    pub fn object_constants(&self, frame: usize, object: usize) -> Option<ObjectConstants> {
        self.frames.get(frame)?.objects.read(object)
    }

    #[must_use]
    pub fn light_constants(&self, frame: usize) -> Option<LightConstants> {
        self.frames.get(frame)?.light.read(0)
    }

    // ── Setup ─────────────────────────────────────────────────────────────

    /// One-time pipeline setup against `target`.
    pub fn setup(&mut self, target: &wgpu::Texture, scene: &mut ShadowScene) -> Result<()> {
        if scene.mesh_count() != self.meshes.len() {
            return Err(ShadowError::SetupIncomplete("scene and mesh buffers disagree"));
        }

        // Rebuilding while a previous setup is in flight.
        self.ring.drain()?;

        self.target = Some(DepthTarget::new(target)?);
        self.create_layout();
        self.create_texture_table()?;
        self.create_pipelines(scene)?;
        self.create_constant_buffers(scene)?;
        self.create_indirect_buffers(scene)?;
        self.record_bundles()?;

        log::info!(
            "Shadow pass ready: {} meshes, {} cutouts, {}x{} target, indirect {}",
            self.meshes.len(),
            self.cutouts.len(),
            self.target.as_ref().map_or(0, |t| t.width),
            self.target.as_ref().map_or(0, |t| t.height),
            if self.merged.is_some() { "on" } else { "off" }
        );
        Ok(())
    }

    fn create_texture_table(&mut self) -> Result<()> {
        let layout = self.layout.as_ref().ok_or(ShadowError::SetupIncomplete("layout"))?;
        let placeholder = self
            .placeholder
            .get_or_insert_with(|| create_placeholder(&self.device, &self.queue));

        let views = self.cutouts.resolve(placeholder);
        self.texture_group = Some(layout.texture_bind_group(&self.device, &views));
        Ok(())
    }

    fn create_layout(&mut self) {
        if self.layout.is_none() {
            self.layout = Some(ShadowLayout::new(&self.device, &self.settings));
        }
    }

    fn create_pipelines(&mut self, scene: &ShadowScene) -> Result<()> {
        let layout = self.layout.as_ref().ok_or(ShadowError::SetupIncomplete("layout"))?;
        let format = self.target.as_ref().ok_or(ShadowError::SetupIncomplete("depth target"))?.format;

        let mut strides: SmallVec<[u32; 4]> = SmallVec::new();
        for mesh in scene.meshes() {
            if !strides.contains(&mesh.vertex_stride) {
                strides.push(mesh.vertex_stride);
            }
        }

        for vertex_stride in strides {
            self.pipelines.get_or_create(
                &self.device,
                layout,
                PipelineKey {
                    vertex_stride,
                    entry: VertexEntry::Direct,
                    depth_format: format,
                },
            );
        }
        Ok(())
    }

    fn create_constant_buffers(&mut self, scene: &mut ShadowScene) -> Result<()> {
        let mesh_count = scene.seal()?;
        let layout = self.layout.as_ref().ok_or(ShadowError::SetupIncomplete("layout"))?;

        self.frames.clear();
        for _ in 0..FRAME_COUNT {
            let objects = UploadBuffer::<ObjectConstants>::new(
                &self.device,
                "Shadow Object Constants",
                mesh_count,
                true,
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::STORAGE,
            );
            let light = UploadBuffer::<LightConstants>::new(
                &self.device,
                "Shadow Light Constants",
                1,
                true,
                wgpu::BufferUsages::UNIFORM,
            );
            let bind_group = layout.frame_bind_group(&self.device, &objects, &light);

            self.frames.push(FrameResources {
                objects,
                light,
                bind_group,
                bundle: None,
                indirect_args: None,
            });
        }

        self.plan = direct_plan(scene.meshes());
        Ok(())
    }

    fn create_indirect_buffers(&mut self, scene: &ShadowScene) -> Result<()> {
        self.merged = None;

        let copyable = self.meshes.iter().all(|m| {
            m.vertex.usage().contains(wgpu::BufferUsages::COPY_SRC)
                && m.index.usage().contains(wgpu::BufferUsages::COPY_SRC)
        });
        let layout = if copyable { IndirectLayout::build(scene.meshes()) } else { None };
        let Some(layout) = layout else {
            log::warn!(
                "Indirect drawing unavailable (meshes must share one vertex stride and allow COPY_SRC); \
                 indirect requests fall back to direct draws"
            );
            return Ok(());
        };

        let format = self.target.as_ref().ok_or(ShadowError::SetupIncomplete("depth target"))?.format;
        let shadow_layout = self.layout.as_ref().ok_or(ShadowError::SetupIncomplete("layout"))?;
        self.pipelines.get_or_create(
            &self.device,
            shadow_layout,
            PipelineKey {
                vertex_stride: layout.vertex_stride,
                entry: VertexEntry::Indirect,
                depth_format: format,
            },
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Shadow Indirect Upload"),
        });

        let mut vertex = DefaultBuffer::<u8>::new(
            &self.device,
            "Shadow Merged Vertices",
            layout.vertex_bytes as usize,
            wgpu::BufferUsages::VERTEX,
            BufferState::CopyDest,
        );
        let mut index = DefaultBuffer::<u32>::new(
            &self.device,
            "Shadow Merged Indices",
            (layout.index_bytes / 4) as usize,
            wgpu::BufferUsages::INDEX,
            BufferState::CopyDest,
        );
        for (mesh, placement) in self.meshes.iter().zip(&layout.placements) {
            vertex.copy_region(&mut encoder, &mesh.vertex, 0, placement.vertex_offset, placement.vertex_bytes);
            index.copy_region(&mut encoder, &mesh.index, 0, placement.index_offset, placement.index_bytes);
        }
        vertex.transition(BufferState::VertexAndIndex);
        index.transition(BufferState::VertexAndIndex);

        let mut staging = Vec::with_capacity(FRAME_COUNT);
        for frame in &mut self.frames {
            let mut args = DefaultBuffer::<DrawIndexedArgs>::new(
                &self.device,
                "Shadow Indirect Arguments",
                layout.args.len(),
                wgpu::BufferUsages::INDIRECT,
                BufferState::CopyDest,
            );
            staging.push(args.upload(&self.device, &mut encoder, &layout.args, BufferState::IndirectArgument));
            frame.indirect_args = Some(args);
        }

        self.queue.submit(Some(encoder.finish()));

        // Staging buffers must outlive the copies.
        for slot in 0..FRAME_COUNT {
            self.ring.wait_for_slot(slot)?;
        }
        drop(staging);

        self.merged = Some(MergedGeometry { vertex, index, layout });
        Ok(())
    }

    /// Records the direct draw loop once per slot into a reusable bundle.
    ///
    /// Bundles bind constant buffers by offset, so transform and texture
    /// index updates made after recording are still honored.
    fn record_bundles(&mut self) -> Result<()> {
        let Some(target) = self.target.as_ref() else {
            return Ok(());
        };

        let mut bundles = Vec::with_capacity(self.frames.len());
        for frame in 0..self.frames.len() {
            let mut encoder = self.device.create_render_bundle_encoder(&wgpu::RenderBundleEncoderDescriptor {
                label: Some("Shadow Bundle"),
                color_formats: &[],
                depth_stencil: Some(wgpu::RenderBundleDepthStencil {
                    format: target.format,
                    depth_read_only: false,
                    stencil_read_only: true,
                }),
                sample_count: 1,
                ..Default::default()
            });
            self.record_direct(&mut encoder, frame)?;
            bundles.push(encoder.finish(&wgpu::RenderBundleDescriptor {
                label: Some("Shadow Bundle"),
            }));
        }

        for (frame, bundle) in self.frames.iter_mut().zip(bundles) {
            frame.bundle = Some(bundle);
        }
        log::debug!("Recorded {} shadow bundles", self.frames.len());
        Ok(())
    }

    // ── Per frame ─────────────────────────────────────────────────────────

    /// Copies object and light state into `frame`'s constant buffers.
    pub fn update_constant_buffer(&mut self, frame: usize, scene: &ShadowScene) -> Result<()> {
        let resources = self
            .frames
            .get_mut(frame)
            .ok_or(ShadowError::SetupIncomplete("constant buffers"))?;

        scene.write_constants(resources.objects.staging_mut(), resources.light.staging_mut());
        resources.objects.flush(&self.queue);
        resources.light.flush(&self.queue);
        Ok(())
    }

    /// Records clear, strategy draws and store of the shadow target.
    pub fn render_shadow(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: usize,
        method: RenderMethod,
    ) -> Result<()> {
        let target = self.target.as_ref().ok_or(ShadowError::SetupIncomplete("depth target"))?;
        let resources = self
            .frames
            .get(frame)
            .ok_or(ShadowError::SetupIncomplete("constant buffers"))?;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Depth Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &target.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.settings.clear_depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);
        pass.set_scissor_rect(0, 0, target.width, target.height);

        match method {
            RenderMethod::Indirect if self.merged.is_some() => {
                self.record_indirect(&mut pass, resources, target)?;
            }
            RenderMethod::Bundle if resources.bundle.is_some() => {
                pass.execute_bundles(resources.bundle.iter());
            }
            _ => self.record_direct(&mut pass, frame)?,
        }

        Ok(())
    }

    /// Binds and draws every object in insertion order.
    fn record_direct<'a, R: DrawRecorder<'a>>(&'a self, recorder: &mut R, frame: usize) -> Result<()> {
        let format = self.target.as_ref().ok_or(ShadowError::SetupIncomplete("depth target"))?.format;
        let textures = self
            .texture_group
            .as_ref()
            .ok_or(ShadowError::SetupIncomplete("cutout table"))?;
        let frame_group = &self
            .frames
            .get(frame)
            .ok_or(ShadowError::SetupIncomplete("constant buffers"))?
            .bind_group;

        recorder.set_bind_group(1, textures, &[]);

        let mut bound_stride = None;
        for item in &self.plan {
            if bound_stride != Some(item.vertex_stride) {
                let key = PipelineKey {
                    vertex_stride: item.vertex_stride,
                    entry: VertexEntry::Direct,
                    depth_format: format,
                };
                let pipeline = self
                    .pipelines
                    .get(&key)
                    .ok_or(ShadowError::SetupIncomplete("pipeline"))?;
                recorder.set_pipeline(pipeline);
                bound_stride = Some(item.vertex_stride);
            }

            let mesh = &self.meshes[item.object as usize];
            recorder.set_bind_group(0, frame_group, &[item.dynamic_offset]);
            recorder.set_vertex_buffer(0, mesh.vertex.slice(..));
            recorder.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            recorder.draw_indexed(0..item.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn record_indirect(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        resources: &FrameResources,
        target: &DepthTarget,
    ) -> Result<()> {
        let (Some(merged), Some(args), Some(textures)) = (
            self.merged.as_ref(),
            resources.indirect_args.as_ref(),
            self.texture_group.as_ref(),
        ) else {
            return Err(ShadowError::SetupIncomplete("indirect buffers"));
        };
        debug_assert_eq!(args.state(), BufferState::IndirectArgument);

        let key = PipelineKey {
            vertex_stride: merged.layout.vertex_stride,
            entry: VertexEntry::Indirect,
            depth_format: target.format,
        };
        let pipeline = self.pipelines.get(&key).ok_or(ShadowError::SetupIncomplete("pipeline"))?;

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &resources.bind_group, &[0]);
        pass.set_bind_group(1, textures, &[]);
        pass.set_vertex_buffer(0, merged.vertex.buffer().slice(..));
        pass.set_index_buffer(merged.index.buffer().slice(..), wgpu::IndexFormat::Uint32);
        pass.multi_draw_indexed_indirect(args.buffer(), 0, merged.layout.draw_count());
        Ok(())
    }

    /// Update, record, submit and advance for the current slot.
    pub fn render_shadows(&mut self, scene: &ShadowScene) -> Result<()> {
        if !self.is_ready() {
            return Err(ShadowError::SetupIncomplete("shadow target not set"));
        }

        let frame = self.ring.current();
        self.update_constant_buffer(frame, scene)?;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Shadow Pass Encoder"),
        });
        self.render_shadow(&mut encoder, frame, self.method)?;
        self.queue.submit(Some(encoder.finish()));

        self.ring.advance()?;
        Ok(())
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    /// Waits for every slot, then drops all device resources. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        self.ring.drain()?;

        self.frames.clear();
        self.merged = None;
        self.plan.clear();
        self.texture_group = None;
        self.pipelines.clear();
        self.layout = None;
        self.target = None;
        self.placeholder = None;
        self.cutouts.clear();
        self.meshes.clear();
        Ok(())
    }
}

impl Drop for ShadowPass {
    fn drop(&mut self) {
        if let Err(err) = self.ring.drain() {
            log::error!("Failed to drain shadow frame ring on drop: {err}");
        }
    }
}

/// 1x1 opaque white texture bound to unused cutout slots.
fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Shadow Cutout Placeholder"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
