//! GPU Shadow Pass Tests
//!
//! Headless end-to-end tests. Each test requests an adapter with the
//! required features and returns early when none is available.
//!
//! Tests for:
//! - Depth written by direct, bundle and indirect strategies is identical
//! - Cutout discard through the texture table
//! - Transform updates after setup are honored by every strategy
//! - Asynchronous rendering and release draining in-flight work
//! - Boundary errors with a live device

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use async_shadow::{
    DeviceContext, DeviceEvent, RenderMethod, RenderMode, RequestOutcome, ShadowError, ShadowPlugin,
    ShadowSettings,
};

const SIZE: u32 = 64;
const DEPTH_EPSILON: f32 = 1e-5;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

fn context() -> Option<DeviceContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    match DeviceContext::request_blocking(&ShadowSettings::default()) {
        Ok(context) => Some(context),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

struct Quad {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

/// Unit quad in the XY plane, facing -Z.
fn quad(device: &wgpu::Device) -> Quad {
    let n = [0.0, 0.0, -1.0];
    let vertices = [
        Vertex { position: [-0.5, -0.5, 0.0], normal: n, uv: [0.0, 1.0] },
        Vertex { position: [0.5, -0.5, 0.0], normal: n, uv: [1.0, 1.0] },
        Vertex { position: [0.5, 0.5, 0.0], normal: n, uv: [1.0, 0.0] },
        Vertex { position: [-0.5, 0.5, 0.0], normal: n, uv: [0.0, 0.0] },
    ];
    let indices: [u32; 6] = [0, 1, 2, 0, 2, 3];

    Quad {
        vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Test Quad Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_SRC,
        }),
        index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Test Quad Indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_SRC,
        }),
    }
}

fn shadow_target(device: &wgpu::Device) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Shadow Map"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth32Float,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// 2x2 texture, fully transparent: every sample discards.
fn transparent_cutout(context: &DeviceContext) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: 2,
        height: 2,
        depth_or_array_layers: 1,
    };
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Cutout"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    context.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255u8, 255, 255, 0].repeat(4),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(8),
            rows_per_image: Some(2),
        },
        size,
    );
    texture
}

fn read_depth(context: &DeviceContext, target: &wgpu::Texture) -> Vec<f32> {
    let buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Depth Readback"),
        size: u64::from(SIZE * SIZE * 4),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Test Readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::DepthOnly,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(SIZE * 4),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    context.queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |_| {});
    context
        .device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .expect("device poll failed");

    let depth = bytemuck::cast_slice::<u8, f32>(&slice.get_mapped_range()).to_vec();
    buffer.unmap();
    depth
}

fn depth_at(depth: &[f32], x: u32, y: u32) -> f32 {
    depth[(y * SIZE + x) as usize]
}

fn assert_same_depth(a: &[f32], b: &[f32], what: &str) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!(
            (x - y).abs() < DEPTH_EPSILON,
            "{what}: texel ({}, {}) differs: {x} vs {y}",
            i as u32 % SIZE,
            i as u32 / SIZE
        );
    }
}

/// Initialized plugin with four quads and one transparent cutout.
///
/// Light at (0, 0, -10) looking +Z with radius 5, so clip x = 0.2 x,
/// clip y = 0.2 y and depth = 0.1 z + 0.5.
///
/// | object | position      | scale | cutout | depth |
/// |--------|---------------|-------|--------|-------|
/// | 0      | (-2, -2,  0)  | 2     | no     | 0.5   |
/// | 1      | ( 2,  2,  1)  | 2     | yes    | -     |
/// | 2      | ( 2, -2, -1)  | 2     | no     | 0.4   |
/// | 3      | (-2, -2, -2)  | 1     | no     | 0.3   |
fn build_scene(context: &DeviceContext, settings: ShadowSettings) -> (ShadowPlugin, wgpu::Texture) {
    let mut plugin = ShadowPlugin::new(settings);
    plugin
        .on_device_event(DeviceEvent::Initialize(context.clone()))
        .unwrap();
    plugin.check_device().unwrap();
    plugin.create_resources().unwrap();

    for _ in 0..4 {
        let quad = quad(&context.device);
        plugin
            .set_mesh_data(Some(quad.vertex), Some(quad.index), 4, 0)
            .unwrap();
    }
    assert!(plugin.set_texture_data(Some(transparent_cutout(context))).unwrap());

    let target = shadow_target(&context.device);
    plugin.set_shadow_texture_data(Some(target.clone())).unwrap();

    // Transforms arrive after setup; bundles must still see them.
    let identity = [0.0, 0.0, 0.0, 1.0];
    plugin.set_object_transform(0, [-2.0, -2.0, 0.0], [2.0; 3], identity).unwrap();
    plugin.set_object_transform(1, [2.0, 2.0, 1.0], [2.0; 3], identity).unwrap();
    plugin.set_object_transform(2, [2.0, -2.0, -1.0], [2.0; 3], identity).unwrap();
    plugin.set_object_transform(3, [-2.0, -2.0, -2.0], [1.0; 3], identity).unwrap();
    plugin.set_obj_texture_index(1, 0).unwrap();
    plugin
        .set_light_transform([0.0, 0.0, -10.0], [0.0, 0.0, 1.0], 5.0)
        .unwrap();

    (plugin, target)
}

fn render_with(
    plugin: &mut ShadowPlugin,
    context: &DeviceContext,
    target: &wgpu::Texture,
    method: RenderMethod,
) -> Vec<f32> {
    plugin.set_render_method(method).unwrap();
    assert_eq!(
        plugin.render_shadows(RenderMode::Synchronous).unwrap(),
        RequestOutcome::Completed
    );
    read_depth(context, target)
}

// ============================================================================
// Strategy equivalence
// ============================================================================

#[test]
fn all_strategies_write_identical_depth() {
    let Some(context) = context() else { return };
    let (mut plugin, target) = build_scene(&context, ShadowSettings::default());

    let direct = render_with(&mut plugin, &context, &target, RenderMethod::Direct);
    let bundle = render_with(&mut plugin, &context, &target, RenderMethod::Bundle);
    let indirect = render_with(&mut plugin, &context, &target, RenderMethod::Indirect);

    assert_same_depth(&direct, &bundle, "bundle vs direct");
    assert_same_depth(&direct, &indirect, "indirect vs direct");

    plugin.release_resources();
}

#[test]
fn direct_depth_matches_scene_layout() {
    let Some(context) = context() else { return };
    let (mut plugin, target) = build_scene(&context, ShadowSettings::default());
    let depth = render_with(&mut plugin, &context, &target, RenderMethod::Direct);

    // Object 3 in front of object 0
    assert!((depth_at(&depth, 19, 44) - 0.3).abs() < 1e-4, "got {}", depth_at(&depth, 19, 44));
    // Object 0 outside object 3
    assert!((depth_at(&depth, 14, 50) - 0.5).abs() < 1e-4, "got {}", depth_at(&depth, 14, 50));
    // Object 2
    assert!((depth_at(&depth, 44, 44) - 0.4).abs() < 1e-4, "got {}", depth_at(&depth, 44, 44));
    // Object 1 is fully cut out
    assert_eq!(depth_at(&depth, 44, 19), 1.0);
    // Empty corner keeps the clear value
    assert_eq!(depth_at(&depth, 2, 2), 1.0);

    plugin.release_resources();
}

#[test]
fn transform_updates_reach_every_strategy() {
    let Some(context) = context() else { return };
    let (mut plugin, target) = build_scene(&context, ShadowSettings::default());

    // Render once per strategy so every frame slot has been used.
    for method in [RenderMethod::Direct, RenderMethod::Bundle, RenderMethod::Indirect] {
        render_with(&mut plugin, &context, &target, method);
    }

    // Move object 2 toward the light and make it the same cutout as object 1.
    plugin
        .set_object_transform(2, [2.0, -2.0, -3.0], [2.0; 3], [0.0, 0.0, 0.0, 1.0])
        .unwrap();
    plugin.set_obj_texture_index(2, 0).unwrap();
    plugin.set_obj_texture_index(1, -1).unwrap();

    for method in [RenderMethod::Direct, RenderMethod::Bundle, RenderMethod::Indirect] {
        let depth = render_with(&mut plugin, &context, &target, method);
        assert_eq!(depth_at(&depth, 44, 44), 1.0, "{method:?}: object 2 should be cut out");
        assert!(
            (depth_at(&depth, 44, 19) - 0.6).abs() < 1e-4,
            "{method:?}: object 1 should now be opaque, got {}",
            depth_at(&depth, 44, 19)
        );
    }

    plugin.release_resources();
}

// ============================================================================
// Asynchronous mode
// ============================================================================

#[test]
fn async_render_matches_sync_after_release() {
    let Some(context) = context() else { return };
    let (mut plugin, target) = build_scene(&context, ShadowSettings::default());
    let sync = render_with(&mut plugin, &context, &target, RenderMethod::Direct);

    // Same scene through the worker, using the indirect path.
    plugin.set_render_method(RenderMethod::Indirect).unwrap();
    let outcome = plugin.render_shadows(RenderMode::Asynchronous).unwrap();
    assert_eq!(outcome, RequestOutcome::Queued);

    // Release joins the worker (running the queued pass) and drains the GPU.
    plugin.release_resources();
    let asynchronous = read_depth(&context, &target);

    assert_same_depth(&sync, &asynchronous, "async indirect vs sync direct");
    assert!(plugin.shadow_render_time().unwrap() >= 0.0);
}

#[test]
fn release_twice_and_repeated_shutdown_are_safe() {
    let Some(context) = context() else { return };
    let (mut plugin, target) = build_scene(&context, ShadowSettings::default());
    render_with(&mut plugin, &context, &target, RenderMethod::Bundle);

    plugin.release_resources();
    plugin.release_resources();
    assert!(matches!(
        plugin.render_shadows(RenderMode::Synchronous),
        Err(ShadowError::SetupIncomplete(_))
    ));

    plugin.on_device_event(DeviceEvent::Shutdown).unwrap();
    plugin.on_device_event(DeviceEvent::Shutdown).unwrap();
    assert!(!plugin.is_initialized());
}

// ============================================================================
// Boundary errors
// ============================================================================

#[test]
fn boundary_errors_with_live_device() {
    let Some(context) = context() else { return };
    let mut plugin = ShadowPlugin::new(ShadowSettings::default());
    plugin
        .on_device_event(DeviceEvent::Initialize(context.clone()))
        .unwrap();

    // Resources need a checked device.
    assert!(matches!(plugin.create_resources(), Err(ShadowError::DeviceNotReady)));
    plugin.check_device().unwrap();

    // Mesh registration needs created resources.
    let q = quad(&context.device);
    assert!(matches!(
        plugin.set_mesh_data(Some(q.vertex.clone()), Some(q.index.clone()), 4, 6),
        Err(ShadowError::NotConfigured)
    ));
    plugin.create_resources().unwrap();

    assert!(matches!(
        plugin.set_mesh_data(None, Some(q.index.clone()), 4, 6),
        Err(ShadowError::NullHandle(_))
    ));
    assert!(matches!(
        plugin.set_mesh_data(Some(q.vertex.clone()), None, 4, 6),
        Err(ShadowError::NullHandle(_))
    ));
    assert!(matches!(plugin.set_texture_data(None), Err(ShadowError::NullHandle(_))));
    assert!(matches!(
        plugin.set_shadow_texture_data(None),
        Err(ShadowError::NullHandle(_))
    ));

    // Nothing to render before setup.
    assert!(matches!(
        plugin.render_shadows(RenderMode::Synchronous),
        Err(ShadowError::SetupIncomplete(_))
    ));

    // Setup fails fast without meshes.
    assert!(matches!(
        plugin.set_shadow_texture_data(Some(shadow_target(&context.device))),
        Err(ShadowError::NoMeshes)
    ));

    plugin.set_mesh_data(Some(q.vertex), Some(q.index), 4, 6).unwrap();
    plugin
        .set_shadow_texture_data(Some(shadow_target(&context.device)))
        .unwrap();

    // Mesh set is fixed after setup.
    let extra = quad(&context.device);
    assert!(matches!(
        plugin.set_mesh_data(Some(extra.vertex), Some(extra.index), 4, 6),
        Err(ShadowError::MeshSetSealed)
    ));

    // Out-of-range and negative indices are ignored.
    plugin
        .set_object_transform(7, [1.0; 3], [1.0; 3], [0.0, 0.0, 0.0, 1.0])
        .unwrap();
    plugin
        .set_object_transform(-1, [1.0; 3], [1.0; 3], [0.0, 0.0, 0.0, 1.0])
        .unwrap();
    plugin.set_obj_texture_index(-3, 2).unwrap();

    plugin
        .set_light_transform([0.0, 10.0, 0.0], [0.0, -1.0, 0.0], 5.0)
        .unwrap();
    let rows = plugin.light_transform().unwrap();
    let expected = [
        0.0, 0.0, -0.2, 0.0, 0.2, 0.0, 0.0, 0.0, 0.0, -0.1, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0,
    ];
    for (a, b) in rows.iter().zip(expected) {
        assert!((a - b).abs() < 1e-5, "{rows:?}");
    }

    plugin.set_render_flags(true, true).unwrap();
    assert_eq!(plugin.render_method().unwrap(), RenderMethod::Indirect);
    plugin.render_shadows(RenderMode::Synchronous).unwrap();
}
