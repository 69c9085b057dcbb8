//! wgpu backend.
//!
//! Lock order is always pass, then scene. Host setters only take the scene
//! lock, so they never wait on GPU pacing; they wait at most for a constant
//! buffer update in progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use parking_lot::{Mutex, RwLock};

use crate::backend::{BackendKind, DeviceContext, DeviceEventKind, ShadowBackend};
use crate::errors::{Result, ShadowError};
use crate::math::{light_view_projection, object_world_matrix, to_row_major};
use crate::renderer::{MeshBuffers, QueueFence, ShadowPass};
use crate::scene::{MeshView, ShadowScene};
use crate::settings::{RenderMethod, RenderMode, ShadowSettings};
use crate::worker::{RenderTimer, RequestOutcome, ShadowWorker};

/// State shared with the worker thread.
struct Shared {
    pass: Mutex<Option<ShadowPass>>,
    scene: RwLock<ShadowScene>,
    method: Mutex<RenderMethod>,
    ready: AtomicBool,
    timer: RenderTimer,
}

impl Shared {
    /// Update + record + submit for the current frame slot, timed.
    fn render_once(&self) -> Result<()> {
        self.timer.measure(|| {
            let mut pass = self.pass.lock();
            let pass = pass.as_mut().ok_or(ShadowError::NotConfigured)?;
            pass.set_render_method(*self.method.lock());
            let scene = self.scene.read();
            pass.render_shadows(&scene)
        })
    }
}

pub struct WgpuShadowBackend {
    context: DeviceContext,
    settings: ShadowSettings,
    fence: Option<QueueFence>,
    device_checked: bool,
    shared: Arc<Shared>,
    worker: Option<ShadowWorker>,
}

impl WgpuShadowBackend {
    #[must_use]
    pub fn new(context: DeviceContext, settings: &ShadowSettings) -> Self {
        Self {
            context,
            settings: settings.clone(),
            fence: None,
            device_checked: false,
            shared: Arc::new(Shared {
                pass: Mutex::new(None),
                scene: RwLock::new(ShadowScene::new()),
                method: Mutex::new(settings.render_method),
                ready: AtomicBool::new(false),
                timer: RenderTimer::new(),
            }),
            worker: None,
        }
    }

    /// Runs `f` on the pass and the scene, honoring the lock order.
    fn with_pass<R>(&self, f: impl FnOnce(&mut ShadowPass, &mut ShadowScene) -> Result<R>) -> Result<R> {
        let mut pass = self.shared.pass.lock();
        let pass = pass.as_mut().ok_or(ShadowError::NotConfigured)?;
        let mut scene = self.shared.scene.write();
        f(pass, &mut scene)
    }

    #[inline]
    fn object_index(index: i32) -> Option<usize> {
        usize::try_from(index).ok()
    }
}

impl ShadowBackend for WgpuShadowBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn process_device_event(&mut self, event: DeviceEventKind) {
        match event {
            DeviceEventKind::Initialize => {
                log::info!("Shadow backend attached to device");
            }
            DeviceEventKind::Shutdown => {
                self.release_resources();
                self.fence = None;
                self.device_checked = false;
            }
        }
    }

    fn check_device(&mut self) -> Result<()> {
        if BackendKind::probe(&self.context.device).is_none() {
            return Err(ShadowError::MissingFeatures(
                crate::backend::required_features() - self.context.device.features(),
            ));
        }
        self.fence = Some(QueueFence::new(&self.context.device, &self.context.queue));
        self.device_checked = true;
        Ok(())
    }

    fn create_resources(&mut self) -> Result<()> {
        if !self.device_checked {
            return Err(ShadowError::DeviceNotReady);
        }
        if self.worker.is_some() {
            log::warn!("Shadow resources already created");
            return Ok(());
        }

        let fence = self
            .fence
            .take()
            .unwrap_or_else(|| QueueFence::new(&self.context.device, &self.context.queue));
        let pass = ShadowPass::new(&self.context.device, &self.context.queue, fence, &self.settings);
        *self.shared.pass.lock() = Some(pass);
        *self.shared.scene.write() = ShadowScene::new();

        let shared = Arc::clone(&self.shared);
        let worker = ShadowWorker::spawn(move || {
            if let Err(err) = shared.render_once() {
                log::error!("Shadow pass failed on worker: {err}");
            }
        })?;
        self.worker = Some(worker);

        log::info!("Shadow resources created");
        Ok(())
    }

    fn release_resources(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.shared.ready.store(false, Ordering::Release);

        let pass = self.shared.pass.lock().take();
        if let Some(mut pass) = pass {
            if let Err(err) = pass.release() {
                log::error!("Failed to drain shadow frames on release: {err}");
            }
            log::info!("Shadow resources released");
        }
        *self.shared.scene.write() = ShadowScene::new();
    }

    fn set_mesh_data(
        &mut self,
        vertex_buffer: Option<wgpu::Buffer>,
        index_buffer: Option<wgpu::Buffer>,
        vertex_count: u32,
        index_count: u32,
    ) -> Result<()> {
        let vertex = vertex_buffer.ok_or(ShadowError::NullHandle("vertex buffer"))?;
        let index = index_buffer.ok_or(ShadowError::NullHandle("index buffer"))?;
        let view = MeshView::from_sizes(vertex.size(), vertex_count, index.size(), index_count)?;

        self.with_pass(|pass, scene| {
            scene.add_mesh(view)?;
            pass.add_mesh(MeshBuffers { vertex, index });
            Ok(())
        })
    }

    fn set_texture_data(&mut self, texture: Option<wgpu::Texture>) -> Result<bool> {
        let texture = texture.ok_or(ShadowError::NullHandle("cutout texture"))?;
        self.with_pass(|pass, _| pass.add_cutout_texture(&texture))
    }

    fn set_shadow_texture_data(&mut self, target: Option<wgpu::Texture>) -> Result<()> {
        let target = target.ok_or(ShadowError::NullHandle("shadow target"))?;
        self.shared.ready.store(false, Ordering::Release);
        self.with_pass(|pass, scene| pass.setup(&target, scene))?;
        self.shared.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn render_shadows(&mut self, mode: RenderMode) -> Result<RequestOutcome> {
        if !self.shared.ready.load(Ordering::Acquire) {
            return Err(ShadowError::SetupIncomplete("shadow target not set"));
        }

        match mode {
            RenderMode::Synchronous => {
                self.shared.render_once()?;
                Ok(RequestOutcome::Completed)
            }
            RenderMode::Asynchronous => self
                .worker
                .as_ref()
                .ok_or(ShadowError::WorkerDisconnected)?
                .request(),
        }
    }

    fn set_object_transform(&mut self, index: i32, position: [f32; 3], scale: [f32; 3], rotation: [f32; 4]) {
        if let Some(index) = Self::object_index(index) {
            let world = object_world_matrix(position, scale, rotation);
            self.shared.scene.write().set_object_transform(index, world);
        }
    }

    fn set_obj_texture_index(&mut self, index: i32, tex_index: i32) {
        if let Some(index) = Self::object_index(index) {
            self.shared.scene.write().set_obj_texture_index(index, tex_index);
        }
    }

    fn set_light_transform(&mut self, position: [f32; 3], direction: [f32; 3], radius: f32) {
        let view_proj = light_view_projection(Vec3::from_array(position), Vec3::from_array(direction), radius);
        self.shared.scene.write().set_shadow_transform(view_proj);
    }

    fn light_transform(&self) -> [f32; 16] {
        to_row_major(&self.shared.scene.read().shadow_transform())
    }

    fn shadow_render_time(&self) -> f64 {
        self.shared.timer.last_ms()
    }

    fn set_render_method(&mut self, method: RenderMethod) {
        *self.shared.method.lock() = method;
    }

    fn render_method(&self) -> RenderMethod {
        *self.shared.method.lock()
    }
}

impl Drop for WgpuShadowBackend {
    fn drop(&mut self) {
        self.release_resources();
    }
}
