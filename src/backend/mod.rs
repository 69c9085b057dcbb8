//! Device / API Abstraction
//!
//! [`ShadowBackend`] is the capability set the plugin drives: device events,
//! resource lifetime, mesh / texture / transform setters, render submission
//! and timing. [`create_backend`] probes the device and returns the variant
//! that can run on it; [`WgpuShadowBackend`] is the only one today.

mod wgpu_backend;

pub use wgpu_backend::WgpuShadowBackend;

use crate::errors::{Result, ShadowError};
use crate::settings::{RenderMethod, RenderMode, ShadowSettings};
use crate::worker::RequestOutcome;

// ============================================================================
// Device context & events
// ============================================================================

/// Device handles supplied by the host.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl DeviceContext {
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Creates a headless device with every feature the shadow pass needs.
    pub async fn request(settings: &ShadowSettings) -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: None,
                force_fallback_adapter: settings.force_fallback,
            })
            .await
            .map_err(|e| ShadowError::AdapterRequestFailed(e.to_string()))?;

        let missing = required_features() - adapter.features();
        if !missing.is_empty() {
            return Err(ShadowError::MissingFeatures(missing));
        }

        let required_limits = wgpu::Limits {
            max_binding_array_elements_per_shader_stage: crate::renderer::MAX_TEXTURES as u32,
            ..wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Shadow Device"),
                required_features: required_features(),
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        log::info!("Shadow device: {:?}", adapter.get_info());
        Ok(Self { device, queue })
    }

    /// Blocking wrapper over [`request`](Self::request).
    pub fn request_blocking(settings: &ShadowSettings) -> Result<Self> {
        pollster::block_on(Self::request(settings))
    }
}

/// Device lifecycle notifications from the host.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Initialize(DeviceContext),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEventKind {
    Initialize,
    Shutdown,
}

impl DeviceEvent {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DeviceEventKind {
        match self {
            Self::Initialize(_) => DeviceEventKind::Initialize,
            Self::Shutdown => DeviceEventKind::Shutdown,
        }
    }
}

// ============================================================================
// Backend selection
// ============================================================================

/// Features the wgpu shadow pass relies on.
#[must_use]
pub fn required_features() -> wgpu::Features {
    wgpu::Features::TEXTURE_BINDING_ARRAY
        | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING
        | wgpu::Features::INDIRECT_FIRST_INSTANCE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Bindless cutout table + first-instance indirect draws over wgpu.
    Wgpu,
}

impl BackendKind {
    /// Picks the backend that can run on `device`, if any.
    #[must_use]
    pub fn probe(device: &wgpu::Device) -> Option<Self> {
        let missing = required_features() - device.features();
        if missing.is_empty() {
            Some(Self::Wgpu)
        } else {
            log::warn!("No shadow backend for this device; missing {missing:?}");
            None
        }
    }
}

/// Builds the backend selected by [`BackendKind::probe`].
#[must_use]
pub fn create_backend(
    context: DeviceContext,
    settings: &ShadowSettings,
) -> Option<Box<dyn ShadowBackend>> {
    match BackendKind::probe(&context.device)? {
        BackendKind::Wgpu => Some(Box::new(WgpuShadowBackend::new(context, settings))),
    }
}

// ============================================================================
// ShadowBackend
// ============================================================================

/// Operations every backend provides.
///
/// Object indices are signed so host-side drift (including negative values)
/// reaches the backend intact; out-of-range indices are ignored.
pub trait ShadowBackend: Send {
    fn kind(&self) -> BackendKind;

    fn process_device_event(&mut self, event: DeviceEventKind);

    /// Validates the device and allocates fence primitives.
    fn check_device(&mut self) -> Result<()>;

    /// Initializes frame-ring state and starts the worker.
    fn create_resources(&mut self) -> Result<()>;

    /// Stops the worker, drains every frame slot, releases device resources.
    /// Safe to call repeatedly.
    fn release_resources(&mut self);

    fn set_mesh_data(
        &mut self,
        vertex_buffer: Option<wgpu::Buffer>,
        index_buffer: Option<wgpu::Buffer>,
        vertex_count: u32,
        index_count: u32,
    ) -> Result<()>;

    /// Returns `false` when the cutout table was already full.
    fn set_texture_data(&mut self, texture: Option<wgpu::Texture>) -> Result<bool>;

    /// Runs the full one-time pipeline setup against the shadow target.
    fn set_shadow_texture_data(&mut self, target: Option<wgpu::Texture>) -> Result<()>;

    fn render_shadows(&mut self, mode: RenderMode) -> Result<RequestOutcome>;

    fn set_object_transform(&mut self, index: i32, position: [f32; 3], scale: [f32; 3], rotation: [f32; 4]);

    fn set_obj_texture_index(&mut self, index: i32, tex_index: i32);

    fn set_light_transform(&mut self, position: [f32; 3], direction: [f32; 3], radius: f32);

    /// Row-major light view-projection.
    fn light_transform(&self) -> [f32; 16];

    /// Milliseconds spent in the last update + record + submit.
    fn shadow_render_time(&self) -> f64;

    fn set_render_method(&mut self, method: RenderMethod);

    fn render_method(&self) -> RenderMethod;
}
