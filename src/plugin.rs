//! Host-Facing Plugin
//!
//! [`ShadowPlugin`] is the context object a host holds for one rendering
//! session. Device lifecycle events create and tear down the backend; every
//! other call forwards to it and reports [`ShadowError::DeviceNotReady`] when
//! no device has been attached.
//!
//! # Typical session
//!
//! ```rust,ignore
//! let mut plugin = ShadowPlugin::new(ShadowSettings::default());
//! plugin.on_device_event(DeviceEvent::Initialize(context))?;
//! plugin.check_device()?;
//! plugin.create_resources()?;
//! for mesh in &meshes {
//!     plugin.set_mesh_data(Some(mesh.vertex.clone()), Some(mesh.index.clone()), mesh.vertex_count, 0)?;
//! }
//! plugin.set_shadow_texture_data(Some(shadow_map))?;
//!
//! // Every frame
//! plugin.set_light_transform(position, direction, 20.0)?;
//! plugin.render()?;
//! ```

use crate::backend::{DeviceEvent, ShadowBackend, create_backend};
use crate::errors::{Result, ShadowError};
use crate::settings::{RenderMethod, RenderMode, ShadowSettings};
use crate::worker::RequestOutcome;

pub struct ShadowPlugin {
    settings: ShadowSettings,
    backend: Option<Box<dyn ShadowBackend>>,
}

impl ShadowPlugin {
    #[must_use]
    pub fn new(settings: ShadowSettings) -> Self {
        Self {
            settings,
            backend: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&dyn ShadowBackend> {
        self.backend.as_deref().ok_or(ShadowError::DeviceNotReady)
    }

    fn backend_mut(&mut self) -> Result<&mut (dyn ShadowBackend + 'static)> {
        self.backend.as_deref_mut().ok_or(ShadowError::DeviceNotReady)
    }

    // ── Device lifecycle ──────────────────────────────────────────────────

    /// Builds or tears down the backend. Repeated shutdowns are no-ops.
    pub fn on_device_event(&mut self, event: DeviceEvent) -> Result<()> {
        let kind = event.kind();
        match event {
            DeviceEvent::Initialize(context) => {
                if let Some(mut old) = self.backend.take() {
                    log::warn!("Device re-initialized; releasing previous shadow backend");
                    old.process_device_event(crate::backend::DeviceEventKind::Shutdown);
                }

                let features = context.device.features();
                let mut backend = create_backend(context, &self.settings).ok_or_else(|| {
                    ShadowError::MissingFeatures(crate::backend::required_features() - features)
                })?;
                log::info!("Shadow backend selected: {:?}", backend.kind());
                backend.process_device_event(kind);
                self.backend = Some(backend);
            }
            DeviceEvent::Shutdown => {
                if let Some(mut backend) = self.backend.take() {
                    backend.process_device_event(kind);
                    log::info!("Shadow backend shut down");
                }
            }
        }
        Ok(())
    }

    // ── Resources ─────────────────────────────────────────────────────────

    pub fn check_device(&mut self) -> Result<()> {
        self.backend_mut()?.check_device()
    }

    pub fn create_resources(&mut self) -> Result<()> {
        self.backend_mut()?.create_resources()
    }

    /// Stops the worker and drains the GPU. Safe to call repeatedly and
    /// before initialization.
    pub fn release_resources(&mut self) {
        if let Some(backend) = self.backend.as_deref_mut() {
            backend.release_resources();
        }
    }

    pub fn set_mesh_data(
        &mut self,
        vertex_buffer: Option<wgpu::Buffer>,
        index_buffer: Option<wgpu::Buffer>,
        vertex_count: u32,
        index_count: u32,
    ) -> Result<()> {
        self.backend_mut()?
            .set_mesh_data(vertex_buffer, index_buffer, vertex_count, index_count)
    }

    /// Returns `false` when the cutout table is already full.
    pub fn set_texture_data(&mut self, texture: Option<wgpu::Texture>) -> Result<bool> {
        self.backend_mut()?.set_texture_data(texture)
    }

    pub fn set_shadow_texture_data(&mut self, target: Option<wgpu::Texture>) -> Result<()> {
        self.backend_mut()?.set_shadow_texture_data(target)
    }

    // ── Rendering ─────────────────────────────────────────────────────────

    /// Renders with the configured [`RenderMode`].
    pub fn render(&mut self) -> Result<RequestOutcome> {
        let mode = self.settings.render_mode;
        self.render_shadows(mode)
    }

    pub fn render_shadows(&mut self, mode: RenderMode) -> Result<RequestOutcome> {
        self.backend_mut()?.render_shadows(mode)
    }

    /// Host-style entry: `multithreaded` selects the worker.
    pub fn render_shadows_multithreaded(&mut self, multithreaded: bool) -> Result<RequestOutcome> {
        self.render_shadows(RenderMode::from_multithreaded(multithreaded))
    }

    pub fn set_render_method(&mut self, method: RenderMethod) -> Result<()> {
        self.backend_mut()?.set_render_method(method);
        Ok(())
    }

    /// Indirect wins when both flags are set.
    pub fn set_render_flags(&mut self, use_indirect: bool, use_bundle: bool) -> Result<()> {
        self.set_render_method(RenderMethod::from_flags(use_indirect, use_bundle))
    }

    pub fn render_method(&self) -> Result<RenderMethod> {
        Ok(self.backend()?.render_method())
    }

    // ── Scene state ───────────────────────────────────────────────────────

    /// Out-of-range indices are ignored.
    pub fn set_object_transform(
        &mut self,
        index: i32,
        position: [f32; 3],
        scale: [f32; 3],
        rotation: [f32; 4],
    ) -> Result<()> {
        self.backend_mut()?.set_object_transform(index, position, scale, rotation);
        Ok(())
    }

    /// Out-of-range indices are ignored; negative values mean opaque.
    pub fn set_obj_texture_index(&mut self, index: i32, tex_index: i32) -> Result<()> {
        self.backend_mut()?.set_obj_texture_index(index, tex_index);
        Ok(())
    }

    pub fn set_light_transform(&mut self, position: [f32; 3], direction: [f32; 3], radius: f32) -> Result<()> {
        self.backend_mut()?.set_light_transform(position, direction, radius);
        Ok(())
    }

    /// Row-major light view-projection.
    pub fn light_transform(&self) -> Result<[f32; 16]> {
        Ok(self.backend()?.light_transform())
    }

    /// CPU milliseconds of the last update + record + submit.
    pub fn shadow_render_time(&self) -> Result<f64> {
        Ok(self.backend()?.shadow_render_time())
    }
}

impl Drop for ShadowPlugin {
    fn drop(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.process_device_event(crate::backend::DeviceEventKind::Shutdown);
        }
    }
}
