//! Draw Plan Tests
//!
//! Tests for:
//! - Direct plan ordering and constant offsets
//! - Indirect layout packing (offsets, base vertex, first index, first instance)
//! - Direct / indirect equivalence: same objects, same index counts
//! - Indirect unavailability for mixed vertex strides

use async_shadow::renderer::draw::{IndirectLayout, direct_plan};
use async_shadow::renderer::uniforms::{CONSTANT_ALIGNMENT, DrawIndexedArgs};
use async_shadow::scene::MeshView;

fn mesh(stride: u32, vertices: u32, indices: u32) -> MeshView {
    MeshView::from_sizes(
        u64::from(stride) * u64::from(vertices),
        vertices,
        u64::from(indices) * 4,
        indices,
    )
    .unwrap()
}

fn sample_meshes() -> Vec<MeshView> {
    vec![mesh(32, 4, 6), mesh(32, 24, 36), mesh(32, 8, 12)]
}

// ============================================================================
// Direct plan
// ============================================================================

#[test]
fn direct_plan_is_insertion_ordered() {
    let plan = direct_plan(&sample_meshes());
    assert_eq!(plan.len(), 3);
    for (i, item) in plan.iter().enumerate() {
        assert_eq!(item.object, i as u32);
        assert_eq!(u64::from(item.dynamic_offset), i as u64 * CONSTANT_ALIGNMENT);
        assert_eq!(item.vertex_stride, 32);
    }
    assert_eq!(plan[1].index_count, 36);
}

#[test]
fn direct_plan_keeps_per_mesh_strides() {
    let plan = direct_plan(&[mesh(32, 4, 6), mesh(48, 4, 6)]);
    assert_eq!(plan[0].vertex_stride, 32);
    assert_eq!(plan[1].vertex_stride, 48);
}

#[test]
fn direct_plan_of_empty_set_is_empty() {
    assert!(direct_plan(&[]).is_empty());
}

// ============================================================================
// Indirect layout
// ============================================================================

#[test]
fn indirect_layout_packs_meshes_back_to_back() {
    let layout = IndirectLayout::build(&sample_meshes()).unwrap();

    assert_eq!(layout.vertex_stride, 32);
    assert_eq!(layout.draw_count(), 3);
    assert_eq!(layout.vertex_bytes, (4 + 24 + 8) * 32);
    assert_eq!(layout.index_bytes, (6 + 36 + 12) * 4);

    let offsets: Vec<(u64, u64)> = layout
        .placements
        .iter()
        .map(|p| (p.vertex_offset, p.index_offset))
        .collect();
    assert_eq!(offsets, vec![(0, 0), (4 * 32, 6 * 4), (28 * 32, 42 * 4)]);
}

#[test]
fn indirect_args_rebase_each_mesh() {
    let layout = IndirectLayout::build(&sample_meshes()).unwrap();
    assert_eq!(
        layout.args,
        vec![
            DrawIndexedArgs {
                index_count: 6,
                instance_count: 1,
                first_index: 0,
                base_vertex: 0,
                first_instance: 0,
            },
            DrawIndexedArgs {
                index_count: 36,
                instance_count: 1,
                first_index: 6,
                base_vertex: 4,
                first_instance: 1,
            },
            DrawIndexedArgs {
                index_count: 12,
                instance_count: 1,
                first_index: 42,
                base_vertex: 28,
                first_instance: 2,
            },
        ]
    );
}

#[test]
fn direct_and_indirect_draw_the_same_objects() {
    let meshes = sample_meshes();
    let plan = direct_plan(&meshes);
    let layout = IndirectLayout::build(&meshes).unwrap();

    assert_eq!(plan.len(), layout.args.len());
    for (item, args) in plan.iter().zip(&layout.args) {
        // first_instance selects the same constants the dynamic offset does
        assert_eq!(item.object, args.first_instance);
        assert_eq!(item.index_count, args.index_count);
        assert_eq!(args.instance_count, 1);
    }
}

#[test]
fn placements_match_mesh_sizes() {
    let meshes = sample_meshes();
    let layout = IndirectLayout::build(&meshes).unwrap();
    for (placement, mesh) in layout.placements.iter().zip(&meshes) {
        assert_eq!(placement.vertex_bytes, mesh.vertex_bytes());
        assert_eq!(placement.index_bytes, mesh.index_bytes());
        assert_eq!(placement.vertex_offset % 4, 0);
        assert_eq!(placement.index_offset % 4, 0);
    }
}

#[test]
fn mixed_strides_disable_indirect() {
    assert!(IndirectLayout::build(&[mesh(32, 4, 6), mesh(40, 4, 6)]).is_none());
}

#[test]
fn empty_set_has_no_indirect_layout() {
    assert!(IndirectLayout::build(&[]).is_none());
}
