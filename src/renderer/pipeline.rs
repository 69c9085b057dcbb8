//! Shadow Pipeline Layout & Cache
//!
//! [`ShadowLayout`] is the binding contract shared by every submission path:
//!
//! | Group | Binding | Resource                                   | Stage    |
//! |-------|---------|--------------------------------------------|----------|
//! | 0     | 0       | object constants, dynamic offset           | vertex   |
//! | 0     | 1       | light constants                            | vertex   |
//! | 0     | 2       | object constants array (indirect draws)    | vertex   |
//! | 1     | 0       | `binding_array<texture_2d<f32>, 16>`       | fragment |
//! | 1     | 1       | anisotropic wrap sampler                   | fragment |
//!
//! Changing [`ObjectConstants`] or [`LightConstants`] requires updating the
//! WGSL structs, this table and [`DrawIndexedArgs`](crate::renderer::uniforms::DrawIndexedArgs)
//! consumers together.
//!
//! [`PipelineCache`] builds one depth-only pipeline per vertex stride and
//! vertex entry point.

use std::borrow::Cow;
use std::num::{NonZeroU32, NonZeroU64};

use rustc_hash::FxHashMap;

use crate::renderer::buffer::UploadBuffer;
use crate::renderer::uniforms::{LightConstants, MAX_TEXTURES, ObjectConstants};
use crate::settings::ShadowSettings;

pub const SHADER_SOURCE: &str = include_str!("shaders/shadow.wgsl");

// ─── Vertex Layout ───────────────────────────────────────────────────────────

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Float32x2
];

#[must_use]
pub fn vertex_layout(stride: u32) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: u64::from(stride),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

// ─── Layout ──────────────────────────────────────────────────────────────────

pub struct ShadowLayout {
    pub frame_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub sampler: wgpu::Sampler,
    module: wgpu::ShaderModule,
}

impl ShadowLayout {
    #[must_use]
    pub fn new(device: &wgpu::Device, settings: &ShadowSettings) -> Self {
        let constant_size = NonZeroU64::new(std::mem::size_of::<ObjectConstants>() as u64);
        let light_size = NonZeroU64::new(std::mem::size_of::<LightConstants>() as u64);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Frame Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: constant_size,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: light_size,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: constant_size,
                    },
                    count: None,
                },
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Cutout Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: NonZeroU32::new(MAX_TEXTURES as u32),
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[Some(&frame_layout), Some(&texture_layout)],
            immediate_size: 0,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Cutout Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            anisotropy_clamp: settings.max_anisotropy.max(1),
            ..Default::default()
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER_SOURCE)),
        });

        Self {
            frame_layout,
            texture_layout,
            pipeline_layout,
            sampler,
            module,
        }
    }

    /// Binds one frame slot's constant buffers.
    #[must_use]
    pub fn frame_bind_group(
        &self,
        device: &wgpu::Device,
        objects: &UploadBuffer<ObjectConstants>,
        light: &UploadBuffer<LightConstants>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Frame BindGroup"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: objects.buffer(),
                        offset: 0,
                        size: NonZeroU64::new(std::mem::size_of::<ObjectConstants>() as u64),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: objects.buffer().as_entire_binding(),
                },
            ],
        })
    }

    /// Binds the cutout table. `views` must already be padded with the
    /// placeholder.
    #[must_use]
    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        views: &[&wgpu::TextureView; MAX_TEXTURES],
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Cutout BindGroup"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureViewArray(views),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

// ─── Pipeline Cache ──────────────────────────────────────────────────────────

/// Which vertex entry point feeds object constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexEntry {
    /// Dynamic-offset uniform (direct and bundle paths).
    Direct,
    /// Storage array indexed by instance (indirect path).
    Indirect,
}

impl VertexEntry {
    #[inline]
    fn name(self) -> &'static str {
        match self {
            Self::Direct => "vs_direct",
            Self::Indirect => "vs_indirect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vertex_stride: u32,
    pub entry: VertexEntry,
    pub depth_format: wgpu::TextureFormat,
}

#[derive(Default)]
pub struct PipelineCache {
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        layout: &ShadowLayout,
        key: PipelineKey,
    ) -> &wgpu::RenderPipeline {
        self.pipelines.entry(key).or_insert_with(|| {
            log::debug!(
                "Building shadow pipeline: stride {} entry {:?} depth {:?}",
                key.vertex_stride,
                key.entry,
                key.depth_format
            );
            create_pipeline(device, layout, key)
        })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &ShadowLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Shadow Depth Pipeline"),
        layout: Some(&layout.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &layout.module,
            entry_point: Some(key.entry.name()),
            buffers: &[vertex_layout(key.vertex_stride)],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &layout.module,
            entry_point: Some("fs_main"),
            targets: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: key.depth_format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
