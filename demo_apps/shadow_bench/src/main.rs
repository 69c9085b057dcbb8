//! Headless shadow benchmark.
//!
//! Plays the host's role: registers a grid of cubes (every other one a
//! cutout), hands over a depth target, then spins a light around the scene
//! and reports the average CPU pass time of each strategy in both modes.
//!
//! ```text
//! RUST_LOG=info cargo run -p shadow_bench -- 24 120
//! ```
//! Arguments: grid side (default 16), frames per run (default 120).

use std::time::Instant;

use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use wgpu::util::DeviceExt;

use async_shadow::{
    DeviceContext, DeviceEvent, RenderMethod, RenderMode, ShadowPlugin, ShadowSettings,
};

const SHADOW_MAP_SIZE: u32 = 2048;
const CUTOUT_SIZE: u32 = 64;
const CUTOUT_COUNT: i32 = 4;
const SPACING: f32 = 3.0;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

// ============================================================================
// Host resources
// ============================================================================

/// Unit cube, 24 vertices / 36 indices.
fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::NEG_Z, Vec3::X),
        (Vec3::Z, Vec3::Y, Vec3::NEG_X),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, up, right) in faces {
        let base = vertices.len() as u32;
        for (u, v) in [(0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)] {
            let p = normal * 0.5 + right * (u - 0.5) + up * (0.5 - v);
            vertices.push(Vertex {
                position: p.to_array(),
                normal: normal.to_array(),
                uv: [u, v],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn create_cube(device: &wgpu::Device) -> (wgpu::Buffer, wgpu::Buffer, u32) {
    let (vertices, indices) = cube_geometry();
    let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Cube Vertices"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_SRC,
    });
    let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Cube Indices"),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_SRC,
    });
    (vertex, index, vertices.len() as u32)
}

/// Checkerboard alpha mask with `cells` squares per side.
fn create_cutout(context: &DeviceContext, cells: u32) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: CUTOUT_SIZE,
        height: CUTOUT_SIZE,
        depth_or_array_layers: 1,
    };
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Cutout Mask"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let cell = CUTOUT_SIZE / cells;
    let mut texels: Vec<u8> = Vec::with_capacity((CUTOUT_SIZE * CUTOUT_SIZE * 4) as usize);
    for y in 0..CUTOUT_SIZE {
        for x in 0..CUTOUT_SIZE {
            let alpha = if (x / cell + y / cell) % 2 == 0 { 255 } else { 0 };
            texels.extend_from_slice(&[255, 255, 255, alpha]);
        }
    }

    context.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &texels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(CUTOUT_SIZE * 4),
            rows_per_image: Some(CUTOUT_SIZE),
        },
        size,
    );
    texture
}

fn create_shadow_map(device: &wgpu::Device) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Shadow Map"),
        size: wgpu::Extent3d {
            width: SHADOW_MAP_SIZE,
            height: SHADOW_MAP_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

// ============================================================================
// Scene
// ============================================================================

struct Bench {
    plugin: ShadowPlugin,
    object_count: i32,
    radius: f32,
}

impl Bench {
    fn new(context: &DeviceContext, side: u32) -> anyhow::Result<Self> {
        let mut plugin = ShadowPlugin::new(ShadowSettings::default());
        plugin.on_device_event(DeviceEvent::Initialize(context.clone()))?;
        plugin.check_device()?;
        plugin.create_resources()?;

        let object_count = (side * side) as i32;
        for _ in 0..object_count {
            let (vertex, index, vertex_count) = create_cube(&context.device);
            plugin.set_mesh_data(Some(vertex), Some(index), vertex_count, 0)?;
        }
        for i in 0..CUTOUT_COUNT {
            plugin.set_texture_data(Some(create_cutout(context, 2u32 << i)))?;
        }

        plugin
            .set_shadow_texture_data(Some(create_shadow_map(&context.device)))
            .context("shadow pass setup failed")?;

        let half = (side as f32 - 1.0) * SPACING * 0.5;
        for i in 0..object_count {
            let (row, col) = (i as u32 / side, i as u32 % side);
            let position = [col as f32 * SPACING - half, 0.0, row as f32 * SPACING - half];
            let rotation = Quat::from_rotation_y(i as f32 * 0.7);
            let scale = 1.0 + (i % 3) as f32 * 0.5;
            plugin.set_object_transform(i, position, [scale; 3], rotation.to_array())?;

            // Every other object is a cutout.
            let tex_index = if i % 2 == 1 { (i / 2) % CUTOUT_COUNT } else { -1 };
            plugin.set_obj_texture_index(i, tex_index)?;
        }

        Ok(Self {
            plugin,
            object_count,
            radius: half * std::f32::consts::SQRT_2 + SPACING,
        })
    }

    fn update_light(&mut self, frame: u32) -> anyhow::Result<()> {
        let angle = frame as f32 * 0.02;
        let direction = Vec3::new(angle.cos(), -1.5, angle.sin()).normalize();
        let position = -direction * self.radius * 2.0;
        self.plugin
            .set_light_transform(position.to_array(), direction.to_array(), self.radius)?;
        Ok(())
    }

    fn run(&mut self, method: RenderMethod, mode: RenderMode, frames: u32) -> anyhow::Result<Timing> {
        self.plugin.set_render_method(method)?;

        let start = Instant::now();
        let mut pass_ms = 0.0;
        for frame in 0..frames {
            self.update_light(frame)?;
            self.plugin.render_shadows(mode)?;
            pass_ms += self.plugin.shadow_render_time()?;
        }

        Ok(Timing {
            method,
            mode,
            pass_ms: pass_ms / f64::from(frames),
            host_ms: start.elapsed().as_secs_f64() * 1000.0 / f64::from(frames),
        })
    }
}

struct Timing {
    method: RenderMethod,
    mode: RenderMode,
    /// Average CPU time of update + record + submit.
    pass_ms: f64,
    /// Average time the host thread spent per frame.
    host_ms: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let side: u32 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(16);
    let frames: u32 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(120).max(1);

    let context = DeviceContext::request_blocking(&ShadowSettings::default())
        .context("no adapter with the features the shadow pass needs")?;
    let mut bench = Bench::new(&context, side.max(1))?;
    log::info!("Scene: {} objects, shadow radius {:.1}", bench.object_count, bench.radius);

    let mut timings = Vec::new();
    for mode in [RenderMode::Synchronous, RenderMode::Asynchronous] {
        for method in [RenderMethod::Direct, RenderMethod::Bundle, RenderMethod::Indirect] {
            timings.push(bench.run(method, mode, frames)?);
        }
    }

    println!("{:<10} {:<13} {:>10} {:>10}", "method", "mode", "pass ms", "host ms");
    for t in &timings {
        println!(
            "{:<10} {:<13} {:>10.3} {:>10.3}",
            format!("{:?}", t.method),
            format!("{:?}", t.mode),
            t.pass_ms,
            t.host_ms
        );
    }

    bench.plugin.release_resources();
    bench.plugin.on_device_event(DeviceEvent::Shutdown)?;
    Ok(())
}
